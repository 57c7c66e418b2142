use chrono::{DateTime, Utc};
use rocket::form::Form;
use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket::serde::json::serde_json;
use rocket::State;
use rocket_dyn_templates::context;
use sea_orm::DatabaseConnection;
use serde::Serialize;

use crate::csrf::CsrfToken;
use crate::errors::AppError;
use crate::models::patient::{area_stats, PatientRecord, TriageArea};
use crate::services::patient_service::{PatientInput, PatientService, PatientStore};
use crate::validation::{format_triage_number, PatientFormValidation};
use crate::views::app_template::AppTemplate;
use crate::views::projection::{self, SortKey};

/// 傷病者登録・編集フォームのデータ構造
#[derive(FromForm)]
pub struct PatientForm<'r> {
    pub triage_number: &'r str,
    #[field(default = "")]
    pub name: &'r str,
    pub patient_id: &'r str,
    #[field(default = "")]
    pub gender: &'r str,
    #[field(default = "")]
    pub age: &'r str,
    #[field(default = "赤")]
    pub area: &'r str,
    #[field(default = "")]
    pub injury: &'r str,
    #[field(default = "")]
    pub treatment: &'r str,
    #[field(default = "")]
    pub csrf_token: &'r str,
}

impl<'r> PatientForm<'r> {
    fn to_input(&self) -> PatientInput {
        PatientInput {
            triage_number: self.triage_number.to_owned(),
            name: self.name.to_owned(),
            patient_id: self.patient_id.to_owned(),
            gender: self.gender.to_owned(),
            age: self.age.to_owned(),
            area: TriageArea::from_label(self.area).unwrap_or_default(),
            injury: self.injury.to_owned(),
            treatment: self.treatment.to_owned(),
        }
    }

    /// フォーム再表示用のコンテキスト（入力値を戻す）
    fn context_value(&self) -> serde_json::Value {
        serde_json::json!({
            "triage_number": self.triage_number,
            "name": self.name,
            "patient_id": self.patient_id,
            "gender": self.gender,
            "age": self.age,
            "area": self.area,
            "injury": self.injury,
            "treatment": self.treatment,
        })
    }
}

/// 重複確認ダイアログからの上書き実行フォーム。
/// 入力内容に加えて、衝突した既存レコードと編集中レコードのIDを運ぶ。
#[derive(FromForm)]
pub struct OverwriteForm<'r> {
    pub triage_number: &'r str,
    #[field(default = "")]
    pub name: &'r str,
    pub patient_id: &'r str,
    #[field(default = "")]
    pub gender: &'r str,
    #[field(default = "")]
    pub age: &'r str,
    #[field(default = "赤")]
    pub area: &'r str,
    #[field(default = "")]
    pub injury: &'r str,
    #[field(default = "")]
    pub treatment: &'r str,
    pub duplicate_id: i64,
    pub editing_id: Option<i64>,
    #[field(default = "")]
    pub csrf_token: &'r str,
}

impl<'r> OverwriteForm<'r> {
    fn to_input(&self) -> PatientInput {
        PatientInput {
            triage_number: self.triage_number.to_owned(),
            name: self.name.to_owned(),
            patient_id: self.patient_id.to_owned(),
            gender: self.gender.to_owned(),
            age: self.age.to_owned(),
            area: TriageArea::from_label(self.area).unwrap_or_default(),
            injury: self.injury.to_owned(),
            treatment: self.treatment.to_owned(),
        }
    }
}

/// 一覧テーブルの1行（表示用に整形済み）
#[derive(Serialize)]
struct PatientRow {
    id: i64,
    area: &'static str,
    triage_display: String,
    name: String,
    patient_id: String,
    gender: String,
    age: String,
    injury: String,
    treatment: String,
    updated_relative: String,
}

impl PatientRow {
    fn from_record(p: &PatientRecord, now: DateTime<Utc>) -> Self {
        PatientRow {
            id: p.id,
            area: p.area.label(),
            triage_display: format_triage_number(&p.triage_number),
            name: p.display_name().to_owned(),
            patient_id: p.patient_id.clone(),
            gender: p.display_gender().to_owned(),
            age: p.display_age().to_owned(),
            injury: p.display_injury().to_owned(),
            treatment: p.display_treatment().to_owned(),
            updated_relative: projection::relative_time(p.updated_at, now),
        }
    }
}

/// 登録・編集の送信結果。
/// 成功・失敗はリダイレクト、バリデーションエラーと重複確認はページ表示。
#[derive(Responder)]
pub enum SubmitResponse {
    Flash(Flash<Redirect>),
    Page(AppTemplate),
}

fn flash_json(flash: Option<FlashMessage<'_>>) -> Option<serde_json::Value> {
    flash.map(|f| {
        serde_json::json!({
            "kind": f.kind().to_owned(),
            "message": f.message().to_owned(),
        })
    })
}

fn blank_form() -> serde_json::Value {
    serde_json::json!({
        "triage_number": "",
        "name": "",
        "patient_id": "",
        "gender": "",
        "age": "",
        "area": "赤",
        "injury": "",
        "treatment": "",
    })
}

fn form_context_from_record(p: &PatientRecord) -> serde_json::Value {
    serde_json::json!({
        "triage_number": p.triage_number,
        "name": p.name,
        "patient_id": p.patient_id,
        "gender": p.gender,
        "age": p.age,
        "area": p.area.label(),
        "injury": p.injury,
        "treatment": p.treatment,
    })
}

/// 傷病者一覧を表示。
/// `mode=area` は現場の入力ビュー、`mode=headquarters` は本部管理ビュー。
#[get("/?<mode>&<area>&<q>&<sort>")]
pub async fn list(
    store: &State<PatientStore>,
    flash: Option<FlashMessage<'_>>,
    mode: Option<String>,
    area: Option<String>,
    q: Option<String>,
    sort: Option<String>,
) -> AppTemplate {
    let mode = match mode.as_deref() {
        Some("headquarters") => "headquarters",
        _ => "area",
    };
    let selected_area = area.as_deref().and_then(TriageArea::from_label);
    let query = q.unwrap_or_default();
    let sort_key = SortKey::from_param(sort.as_deref().unwrap_or_default());

    let patients = store.snapshot();
    let projected = projection::project(&patients, selected_area, &query, sort_key);
    let now = Utc::now();
    let rows: Vec<PatientRow> = projected
        .iter()
        .map(|p| PatientRow::from_record(p, now))
        .collect();

    let stats: Vec<serde_json::Value> = area_stats(&patients)
        .iter()
        .map(|(area, count)| {
            serde_json::json!({
                "area": area.label(),
                "count": count,
                "selected": selected_area == Some(*area),
            })
        })
        .collect();

    AppTemplate::new(
        "patients/list",
        context! {
            mode: mode,
            patients: &rows,
            count: rows.len(),
            stats: stats,
            selected_area: selected_area.map(|a| a.label()),
            search_query: &query,
            sort: sort_key.as_str(),
            flash: flash_json(flash),
        },
    )
}

/// 新規登録フォーム (GET)
#[get("/form")]
pub fn create_form(flash: Option<FlashMessage<'_>>) -> AppTemplate {
    AppTemplate::new(
        "patients/form",
        context! {
            form: blank_form(),
            is_edit: false,
            touched: false,
            error: serde_json::Value::Null,
            flash: flash_json(flash),
        },
    )
}

/// 編集フォーム (GET)。既存レコードの内容をフォームに読み込む。
#[get("/edit/<id>")]
pub fn edit_form(
    store: &State<PatientStore>,
    flash: Option<FlashMessage<'_>>,
    id: i64,
) -> Result<AppTemplate, Flash<Redirect>> {
    let patient = PatientService::find(store, id)
        .ok_or_else(|| Flash::error(Redirect::to("/patients"), "傷病者が見つかりません"))?;

    Ok(AppTemplate::new(
        "patients/form",
        context! {
            form: form_context_from_record(&patient),
            is_edit: true,
            id: id,
            touched: false,
            error: serde_json::Value::Null,
            flash: flash_json(flash),
        },
    ))
}

/// 新規登録処理 (POST)
#[post("/create", data = "<form>")]
pub async fn create(
    db: &State<DatabaseConnection>,
    store: &State<PatientStore>,
    csrf: CsrfToken,
    form: Form<PatientForm<'_>>,
) -> SubmitResponse {
    submit(db, store, csrf, form.into_inner(), None).await
}

/// 編集処理 (POST)
#[post("/edit/<id>", data = "<form>")]
pub async fn edit(
    db: &State<DatabaseConnection>,
    store: &State<PatientStore>,
    csrf: CsrfToken,
    id: i64,
    form: Form<PatientForm<'_>>,
) -> SubmitResponse {
    submit(db, store, csrf, form.into_inner(), Some(id)).await
}

/// 登録と編集の共通処理。
/// バリデーション → 重複チェック → 保存の順で、重複が見つかったときは
/// 確認ページを返して利用者の判断（上書き or キャンセル）を待つ。
async fn submit(
    db: &State<DatabaseConnection>,
    store: &State<PatientStore>,
    csrf: CsrfToken,
    form: PatientForm<'_>,
    editing: Option<i64>,
) -> SubmitResponse {
    let back = match editing {
        Some(id) => format!("/patients/edit/{}", id),
        None => "/patients/form".to_owned(),
    };

    if !csrf.verify(form.csrf_token) {
        return SubmitResponse::Flash(Flash::error(
            Redirect::to(back),
            "CSRF検証に失敗しました",
        ));
    }

    // バリデーション。失敗時は入力値を保持したままフォームを再表示する
    let validation = PatientFormValidation::new(form.triage_number, form.patient_id);
    if let Err(messages) = validation.validate_form() {
        let error = messages.into_iter().next().unwrap_or_default();
        return SubmitResponse::Page(AppTemplate::new(
            "patients/form",
            context! {
                form: form.context_value(),
                is_edit: editing.is_some(),
                id: editing,
                touched: true,
                error: error,
                flash: serde_json::Value::Null,
            },
        ));
    }

    // 重複チェック（編集中のレコード自身は除外）
    let patients = store.snapshot();
    if let Some(dup) =
        PatientService::check_duplicate(&patients, form.patient_id, form.triage_number, editing)
    {
        return SubmitResponse::Page(AppTemplate::new(
            "patients/duplicate",
            context! {
                duplicate: serde_json::json!({
                    "id": dup.id,
                    "name": dup.display_name(),
                    "triage_display": format_triage_number(&dup.triage_number),
                    "patient_id": dup.patient_id,
                }),
                form: form.context_value(),
                editing_id: editing,
            },
        ));
    }

    let result = match editing {
        Some(id) => PatientService::update(db, store, id, form.to_input())
            .await
            .map(|_| "患者情報を更新しました"),
        None => PatientService::register(db, store, form.to_input())
            .await
            .map(|_| "新しい患者を登録しました"),
    };

    match result {
        Ok(message) => {
            SubmitResponse::Flash(Flash::success(Redirect::to("/patients"), message))
        }
        Err(AppError::NotFound) => SubmitResponse::Flash(Flash::error(
            Redirect::to("/patients"),
            "傷病者が見つかりません",
        )),
        Err(e) => {
            log::error!("データの保存に失敗しました: {}", e);
            SubmitResponse::Flash(Flash::error(
                Redirect::to(back),
                "データの保存に失敗しました",
            ))
        }
    }
}

/// 重複確認からの上書き実行 (POST)。
/// 編集中であれば編集対象を、新規登録であれば衝突した既存レコードを
/// 新しい内容で置き換える。IDと登録日時は置き換え先のものを保つ。
#[post("/overwrite", data = "<form>")]
pub async fn overwrite(
    db: &State<DatabaseConnection>,
    store: &State<PatientStore>,
    csrf: CsrfToken,
    form: Form<OverwriteForm<'_>>,
) -> Result<Flash<Redirect>, Flash<Redirect>> {
    if !csrf.verify(form.csrf_token) {
        return Err(Flash::error(
            Redirect::to("/patients/form"),
            "CSRF検証に失敗しました",
        ));
    }

    let validation = PatientFormValidation::new(form.triage_number, form.patient_id);
    if let Err(messages) = validation.validate_form() {
        let error = messages.into_iter().next().unwrap_or_default();
        return Err(Flash::error(Redirect::to("/patients/form"), error));
    }

    let target = form.editing_id.unwrap_or(form.duplicate_id);
    let message = if form.editing_id.is_some() {
        "患者情報を更新しました"
    } else {
        "患者情報を上書きしました"
    };

    match PatientService::update(db, store, target, form.to_input()).await {
        Ok(_) => Ok(Flash::success(Redirect::to("/patients"), message)),
        Err(AppError::NotFound) => Err(Flash::error(
            Redirect::to("/patients"),
            "傷病者が見つかりません",
        )),
        Err(e) => {
            log::error!("データの保存に失敗しました: {}", e);
            Err(Flash::error(
                Redirect::to("/patients"),
                "データの保存に失敗しました",
            ))
        }
    }
}

/// 削除確認ページ (GET)。対象レコードの内容を明示する。
#[get("/delete/<id>")]
pub fn delete_confirm(
    store: &State<PatientStore>,
    id: i64,
) -> Result<AppTemplate, Flash<Redirect>> {
    let patient = PatientService::find(store, id)
        .ok_or_else(|| Flash::error(Redirect::to("/patients"), "傷病者が見つかりません"))?;

    Ok(AppTemplate::new(
        "patients/delete_confirm",
        context! {
            id: id,
            name: patient.display_name(),
            triage_display: format_triage_number(&patient.triage_number),
            patient_id: &patient.patient_id,
        },
    ))
}

/// 削除実行 (POST)。確認を経ない限りこのルートには到達しない。
#[post("/delete/<id>")]
pub async fn delete(
    db: &State<DatabaseConnection>,
    store: &State<PatientStore>,
    id: i64,
) -> Result<Flash<Redirect>, Flash<Redirect>> {
    match PatientService::delete(db, store, id).await {
        Ok(_) => Ok(Flash::success(
            Redirect::to("/patients"),
            "患者情報を削除しました",
        )),
        Err(AppError::NotFound) => Err(Flash::error(
            Redirect::to("/patients"),
            "傷病者が見つかりません",
        )),
        Err(e) => {
            log::error!("データの保存に失敗しました: {}", e);
            Err(Flash::error(
                Redirect::to("/patients"),
                "データの保存に失敗しました",
            ))
        }
    }
}

/// 全削除確認ページ (GET)
#[get("/clear")]
pub fn clear_confirm(store: &State<PatientStore>) -> AppTemplate {
    AppTemplate::new(
        "patients/clear_confirm",
        context! {
            count: store.snapshot().len(),
        },
    )
}

/// 全削除実行 (POST)。空のリストを保存する。
#[post("/clear")]
pub async fn clear(
    db: &State<DatabaseConnection>,
    store: &State<PatientStore>,
) -> Result<Flash<Redirect>, Flash<Redirect>> {
    match PatientService::clear(db, store).await {
        Ok(_) => Ok(Flash::success(
            Redirect::to("/patients"),
            "すべてのデータを削除しました",
        )),
        Err(e) => {
            log::error!("データの保存に失敗しました: {}", e);
            Err(Flash::error(
                Redirect::to("/patients"),
                "データの保存に失敗しました",
            ))
        }
    }
}

/// 手動更新 (POST)。ストレージから再読込する。失敗しても画面には出さない。
#[post("/refresh")]
pub async fn refresh(db: &State<DatabaseConnection>, store: &State<PatientStore>) -> Redirect {
    if let Err(e) = PatientService::load(db, store).await {
        log::warn!("データの読み込みに失敗しました: {}", e);
    }
    Redirect::to("/patients")
}

/// 自動更新(30秒)のオン・オフ切り替え (POST)
#[derive(FromForm)]
pub struct AutoRefreshForm {
    #[field(default = false)]
    pub enabled: bool,
}

#[post("/autorefresh", data = "<form>")]
pub fn toggle_auto_refresh(store: &State<PatientStore>, form: Form<AutoRefreshForm>) -> Redirect {
    store.set_auto_refresh(form.enabled);
    Redirect::to("/patients")
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        list,
        create_form,
        edit_form,
        create,
        edit,
        overwrite,
        delete_confirm,
        delete,
        clear_confirm,
        clear,
        refresh,
        toggle_auto_refresh,
    ]
}
