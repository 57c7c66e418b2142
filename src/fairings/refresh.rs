use std::time::Duration;

use rocket::fairing::{Fairing, Info, Kind};
use rocket::{Orbit, Rocket};
use sea_orm::DatabaseConnection;

use crate::services::patient_service::{PatientService, PatientStore};

/// 自動更新の間隔（秒）
const REFRESH_INTERVAL_SECS: u64 = 30;

/// 30秒ごとにストレージから傷病者リストを再読込するFairing。
/// トグルが無効の間は何もしない。読み込みは一覧データを
/// 差し替えるだけで、入力中のフォームには影響しない。
pub struct AutoRefreshFairing;

#[rocket::async_trait]
impl Fairing for AutoRefreshFairing {
    fn info(&self) -> Info {
        Info {
            name: "Auto Refresh",
            kind: Kind::Liftoff,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let db = match rocket.state::<DatabaseConnection>() {
            Some(db) => db.clone(),
            None => return,
        };
        let store = match rocket.state::<PatientStore>() {
            Some(store) => store.clone(),
            None => return,
        };

        rocket::tokio::spawn(async move {
            let mut interval =
                rocket::tokio::time::interval(Duration::from_secs(REFRESH_INTERVAL_SECS));
            // 起動直後の即時tickを捨てる
            interval.tick().await;

            loop {
                interval.tick().await;
                if !store.auto_refresh_enabled() {
                    continue;
                }
                if let Err(e) = PatientService::load(&db, &store).await {
                    // 自動更新の失敗は画面には出さない
                    log::warn!("自動更新でデータの読み込みに失敗しました: {}", e);
                }
            }
        });
    }
}
