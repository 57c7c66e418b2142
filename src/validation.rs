use lazy_static::lazy_static;
use regex::Regex;
use validator::{Validate, ValidationError};

lazy_static! {
    /// トリアージ番号から数字以外を取り除くための正規表現。
    /// 全角数字も「数字以外」として扱うため ASCII 範囲のみを残す。
    static ref NON_DIGIT_REGEX: Regex = Regex::new(r"[^0-9]").unwrap();
}

/// トリアージ番号を正規形に変換します。
/// 数字以外の文字を除去し、3桁未満なら先頭をゼロ埋めします。
/// 4桁以上はそのまま通します（切り捨てない）。
pub fn normalize_triage_number(raw: &str) -> String {
    let digits = NON_DIGIT_REGEX.replace_all(raw, "");
    format!("{:0>3}", digits)
}

/// トリアージ番号を表示形式 `TCH-○○○` に整形します。
pub fn format_triage_number(raw: &str) -> String {
    format!("TCH-{}", normalize_triage_number(raw))
}

/// 傷病者登録フォームのバリデーション。
#[derive(Debug, Validate)]
pub struct PatientFormValidation {
    #[validate(length(min = 1, message = "トリアージ番号と患者IDは必須項目です"))]
    pub triage_number: String,

    #[validate(custom(function = "validate_patient_id"))]
    pub patient_id: String,
}

/// 患者IDのバリデーション。必須かつ8桁ちょうど（文字数チェック）。
fn validate_patient_id(patient_id: &str) -> Result<(), ValidationError> {
    if patient_id.is_empty() {
        let mut err = ValidationError::new("required");
        err.message = Some("トリアージ番号と患者IDは必須項目です".into());
        return Err(err);
    }
    if patient_id.chars().count() != 8 {
        let mut err = ValidationError::new("patient_id_length");
        err.message = Some("患者IDは8桁で入力してください".into());
        return Err(err);
    }
    Ok(())
}

impl PatientFormValidation {
    pub fn new(triage_number: &str, patient_id: &str) -> Self {
        Self {
            triage_number: triage_number.to_string(),
            patient_id: patient_id.to_string(),
        }
    }

    /// バリデーションを実行し、エラーメッセージを返す。
    /// メッセージの順序はフィールド定義順で安定させ、重複は除く。
    pub fn validate_form(&self) -> Result<(), Vec<String>> {
        match self.validate() {
            Ok(_) => Ok(()),
            Err(errors) => {
                let field_errors = errors.field_errors();
                let mut messages: Vec<String> = Vec::new();
                for field in ["triage_number", "patient_id"] {
                    if let Some(errs) = field_errors.get(field) {
                        for error in errs.iter() {
                            let msg = error
                                .message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| format!("{} が不正です", field));
                            if !messages.contains(&msg) {
                                messages.push(msg);
                            }
                        }
                    }
                }
                Err(messages)
            }
        }
    }
}
