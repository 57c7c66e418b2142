#[macro_use]
extern crate rocket;

use migration::{Migrator, MigratorTrait};
use rocket::fs::{relative, FileServer};
use rocket::response::Redirect;
use rocket::Build;
use rocket_dyn_templates::Template;

pub mod controllers;
pub mod csrf;
pub mod db;
pub mod entities;
pub mod errors;
pub mod fairings;
pub mod models;
pub mod services;
pub mod validation;
pub mod views;

use fairings::context::ContextFairing;
use fairings::refresh::AutoRefreshFairing;
use services::patient_service::{PatientService, PatientStore};

/// Rocketインスタンスを構築する関数。
/// テスト時にも利用できるように分離しています。
pub async fn build_rocket() -> rocket::Rocket<Build> {
    // .envファイルを読み込む (環境変数の読み込み)
    dotenvy::dotenv().ok();

    // 1. ストレージコラボレータへの接続
    let db = db::set_up_db().await.expect("Failed to connect to DB");

    // 2. マイグレーションの実行
    Migrator::up(&db, None).await.expect("Failed to run migrations");

    // 3. 保存済みの傷病者リストを読み込む。
    //    失敗しても起動は続ける（リストは空のまま、ログのみ）
    let store = PatientStore::new();
    if let Err(e) = PatientService::load(&db, &store).await {
        log::warn!("データの読み込みに失敗しました: {}", e);
    }

    // 4. Rocketインスタンスの構築
    rocket::build()
        .manage(db)
        .manage(store)
        .attach(Template::fairing())
        .attach(ContextFairing)
        .attach(AutoRefreshFairing)
        .mount("/", routes![index])
        .mount("/patients", controllers::patients::routes())
        .mount("/patients", controllers::export::routes())
        .mount("/static", FileServer::from(relative!("static")))
}

#[get("/")]
fn index() -> Redirect {
    Redirect::to("/patients")
}
