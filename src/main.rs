#[macro_use]
extern crate rocket;

use triage_management::build_rocket;

/// アプリケーションのメインエントリーポイント。
#[launch]
async fn rocket() -> _ {
    build_rocket().await
}
