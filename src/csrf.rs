use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::Rng;
use rocket::http::{Cookie, SameSite};
use rocket::request::{FromRequest, Outcome, Request};
use std::time::{SystemTime, UNIX_EPOCH};

/// CSRFトークンの有効期限（秒）
const CSRF_TOKEN_EXPIRY: u64 = 3600; // 1時間

/// CSRFトークン。全てのPOSTでフォームの値とCookieの値を突き合わせます。
#[derive(Debug, Clone)]
pub struct CsrfToken(pub String);

impl CsrfToken {
    /// 新しいCSRFトークンを生成します。
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let random_bytes: [u8; 32] = rng.gen();

        // タイムスタンプを含めて有効期限を管理
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();

        let mut token_data = timestamp.to_be_bytes().to_vec();
        token_data.extend_from_slice(&random_bytes);

        CsrfToken(URL_SAFE_NO_PAD.encode(&token_data))
    }

    /// トークンを検証します。
    pub fn verify(&self, submitted: &str) -> bool {
        if self.0 != submitted {
            return false;
        }

        // トークンをデコードしてタイムスタンプを確認
        if let Ok(decoded) = URL_SAFE_NO_PAD.decode(&self.0) {
            if decoded.len() >= 8 {
                let timestamp_bytes: [u8; 8] = decoded[..8].try_into().unwrap_or([0; 8]);
                let token_time = u64::from_be_bytes(timestamp_bytes);
                let current_time = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap()
                    .as_secs();

                // 有効期限をチェック
                return current_time - token_time < CSRF_TOKEN_EXPIRY;
            }
        }
        false
    }

    /// トークン文字列を取得
    pub fn token(&self) -> &str {
        &self.0
    }
}

/// リクエストからCSRFトークンを取得するガード。
/// CookieからCSRFトークンを読み取り、なければ新規生成します。
#[rocket::async_trait]
impl<'r> FromRequest<'r> for CsrfToken {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let cookies = request.cookies();

        // 既存のトークンがあれば使用、なければ新規生成
        let token = if let Some(cookie) = cookies.get("csrf_token") {
            CsrfToken(cookie.value().to_string())
        } else {
            let new_token = CsrfToken::generate();

            let cookie = Cookie::build(("csrf_token", new_token.0.clone()))
                .path("/")
                .same_site(SameSite::Strict)
                .http_only(false)
                .secure(false); // 開発用。本番では true に

            cookies.add(cookie);
            new_token
        };

        Outcome::Success(token)
    }
}
