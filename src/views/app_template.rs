use std::borrow::Cow;

use chrono::Utc;
use rocket::request::Request;
use rocket::response::{Responder, Result};
use rocket::serde::json::serde_json;
use rocket_dyn_templates::Template;

use crate::fairings::context::CachedCsrf;
use crate::services::patient_service::PatientStore;
use crate::views::projection::relative_time;

/// アプリケーション標準のテンプレートレスポンダー。
/// 全ページ共通のコンテキスト（CSRFトークン、総患者数、最終更新、
/// 自動更新の状態）をテンプレートへ自動注入します。
pub struct AppTemplate {
    pub name: Cow<'static, str>,
    pub context: serde_json::Value,
}

impl AppTemplate {
    pub fn new<N, C>(name: N, context: C) -> Self
    where
        N: Into<Cow<'static, str>>,
        C: serde::Serialize,
    {
        AppTemplate {
            name: name.into(),
            context: serde_json::to_value(context).unwrap_or(serde_json::json!({})),
        }
    }
}

impl<'r> Responder<'r, 'static> for AppTemplate {
    fn respond_to(self, request: &'r Request<'_>) -> Result<'static> {
        // 1. グローバルコンテキストの準備
        let mut global_context = serde_json::Map::new();

        // CSRF (ContextFairingでキャッシュ済み)
        if let Some(cached_csrf) = request.local_cache(|| None::<CachedCsrf>) {
            global_context.insert(
                "csrf_token".into(),
                serde_json::Value::String(cached_csrf.0.clone()),
            );
        }

        // ヘッダ表示用の患者リスト情報
        if let Some(store) = request.rocket().state::<PatientStore>() {
            let total = store.snapshot().len();
            global_context.insert("total_patients".into(), serde_json::json!(total));

            let last_update = store
                .last_update()
                .map(|t| relative_time(t, Utc::now()))
                .unwrap_or_else(|| "-".to_owned());
            global_context.insert(
                "last_update".into(),
                serde_json::Value::String(last_update),
            );

            global_context.insert(
                "auto_refresh".into(),
                serde_json::Value::Bool(store.auto_refresh_enabled()),
            );
        }

        // 2. マージ (ローカルのコンテキストが優先)
        let mut final_context = global_context;

        if let serde_json::Value::Object(local_map) = self.context {
            for (k, v) in local_map {
                final_context.insert(k, v);
            }
        }

        // 3. Templateに委譲
        let template = Template::render(self.name, serde_json::Value::Object(final_context));
        template.respond_to(request)
    }
}
