use rocket::{
    fairing::{Fairing, Info, Kind},
    Data, Request,
};

use crate::csrf::CsrfToken;

/// コンテキストプロセッサとしてのFairing。
/// リクエスト処理前にCSRFトークンを取得・キャッシュし、
/// AppTemplateが全ページへ注入できるようにします。
pub struct ContextFairing;

#[rocket::async_trait]
impl Fairing for ContextFairing {
    fn info(&self) -> Info {
        Info {
            name: "Global Context Processor",
            kind: Kind::Request,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _data: &mut Data<'_>) {
        // Run the guard here so the Cookie is set even on GET-only pages,
        // and cache the token string for AppTemplate.
        let csrf_outcome = request.guard::<CsrfToken>().await;
        if let rocket::outcome::Outcome::Success(csrf) = csrf_outcome {
            let token_str = csrf.token().to_string();
            request.local_cache(|| Some(CachedCsrf(token_str)));
        }
    }
}

// キャッシュ用の型
#[derive(Clone)]
pub struct CachedCsrf(pub String);
