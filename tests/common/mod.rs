use rocket::http::{ContentType, Status};
use rocket::local::blocking::Client;
use rocket::tokio::runtime::Runtime;
use sea_orm::DatabaseConnection;
use std::sync::OnceLock;

use triage_management::build_rocket;
use triage_management::models::patient::PatientRecord;
use triage_management::services::patient_service::STORAGE_KEY;
use triage_management::services::storage_service::StorageService;

/// インメモリSQLiteの接続はそれを生成したランタイムに紐づくため、
/// rocketの構築と直接のDBアクセスを同一の永続ランタイム上で行う。
fn runtime() -> &'static Runtime {
    static RT: OnceLock<Runtime> = OnceLock::new();
    RT.get_or_init(|| {
        Runtime::new().expect("failed to build shared test runtime")
    })
}

/// テスト用のクライアントを構築する。
/// DATABASE_URLを設定していなければインメモリSQLiteが使われるため、
/// クライアントごとに独立した空のストレージになる。
pub fn setup() -> Client {
    let rocket = runtime().block_on(async { build_rocket().await });
    Client::tracked(rocket).expect("valid rocket instance")
}

/// CSRFトークンを取得する。
/// 一度GETしてCookieにトークンを発行させ、その値をそのまま使う。
pub fn csrf_token(client: &Client) -> String {
    client.get("/patients/form").dispatch();
    client
        .cookies()
        .get("csrf_token")
        .expect("csrf cookie should be set")
        .value()
        .to_string()
}

/// ストレージに保存されている傷病者リストを直接読み出す。
pub fn stored_patients(client: &Client) -> Vec<PatientRecord> {
    let db = client.rocket().state::<DatabaseConnection>().unwrap();

    // rocketの構築と同じランタイムでDBアクセスする（上記コメント参照）
    runtime()
        .block_on(async {
            match StorageService::get(db, STORAGE_KEY).await.unwrap() {
                Some(value) => serde_json::from_str(&value).unwrap(),
                None => Vec::new(),
            }
        })
}

/// application/x-www-form-urlencoded 用のエンコード
pub fn form_encode(value: &str) -> String {
    let mut encoded = String::new();
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                encoded.push(byte as char)
            }
            b' ' => encoded.push('+'),
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

/// 登録・編集フォームのボディを組み立てる
pub fn patient_form_body(
    client: &Client,
    triage_number: &str,
    name: &str,
    patient_id: &str,
    area: &str,
) -> String {
    let token = csrf_token(client);
    format!(
        "triage_number={}&name={}&patient_id={}&gender=&age=&area={}&injury=&treatment=&csrf_token={}",
        form_encode(triage_number),
        form_encode(name),
        form_encode(patient_id),
        form_encode(area),
        token,
    )
}

/// 傷病者を1人登録し、成功（リダイレクト）を確認する
pub fn register_patient(client: &Client, triage_number: &str, name: &str, patient_id: &str) {
    let body = patient_form_body(client, triage_number, name, patient_id, "赤");
    let response = client
        .post("/patients/create")
        .header(ContentType::Form)
        .body(body)
        .dispatch();
    assert_eq!(response.status(), Status::SeeOther);
}
