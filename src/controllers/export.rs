use chrono::Utc;
use rocket::State;

use crate::services::patient_service::PatientStore;
use crate::views::export::{build_csv, export_filename, CsvDownload};

/// 全傷病者リスト（フィルタなし）のCSVダウンロード。
/// 読み取り専用の操作で、状態は変更しない。
#[get("/export")]
pub fn export(store: &State<PatientStore>) -> CsvDownload {
    let patients = store.snapshot();

    CsvDownload {
        filename: export_filename(Utc::now().date_naive()),
        body: build_csv(&patients),
    }
}

pub fn routes() -> Vec<rocket::Route> {
    routes![export]
}
