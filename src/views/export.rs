use std::io::Cursor;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use rocket::request::Request;
use rocket::response::{self, Responder, Response};

use crate::models::patient::PatientRecord;
use crate::validation::format_triage_number;

/// CSVのヘッダ行
const HEADERS: [&str; 10] = [
    "エリア",
    "トリアージ番号",
    "氏名",
    "患者ID",
    "性別",
    "年齢",
    "傷病名",
    "処置状況",
    "登録日時",
    "更新日時",
];

/// Excelで文字化けしないように先頭に付けるBOM
const BOM: &str = "\u{feff}";

/// 日時表示のタイムゾーン (JST)
const JST_OFFSET_SECS: i32 = 9 * 3600;

fn format_jst(timestamp: DateTime<Utc>) -> String {
    let jst = FixedOffset::east_opt(JST_OFFSET_SECS).expect("valid JST offset");
    timestamp
        .with_timezone(&jst)
        .format("%Y/%m/%d %H:%M:%S")
        .to_string()
}

fn quote(cell: &str) -> String {
    format!("\"{}\"", cell.replace('"', "\"\""))
}

/// 全件（フィルタなし）をCSV文字列に変換する。読み取り専用の操作。
pub fn build_csv(patients: &[PatientRecord]) -> String {
    let mut lines = vec![HEADERS.join(",")];

    for p in patients {
        let cells: [String; 10] = [
            p.area.label().to_owned(),
            format_triage_number(&p.triage_number),
            p.display_name().to_owned(),
            p.patient_id.clone(),
            p.display_gender().to_owned(),
            p.display_age().to_owned(),
            p.display_injury().to_owned(),
            p.display_treatment().to_owned(),
            format_jst(p.created_at),
            format_jst(p.updated_at),
        ];
        let row: Vec<String> = cells.iter().map(|cell| quote(cell)).collect();
        lines.push(row.join(","));
    }

    format!("{}{}", BOM, lines.join("\n"))
}

/// ダウンロードファイル名 `傷病者リスト_YYYY-MM-DD.csv`
pub fn export_filename(date: NaiveDate) -> String {
    format!("傷病者リスト_{}.csv", date.format("%Y-%m-%d"))
}

/// CSVダウンロードのレスポンダー。
/// 非ASCIIのファイル名はRFC 5987形式 (`filename*=UTF-8''...`) で渡す。
pub struct CsvDownload {
    pub filename: String,
    pub body: String,
}

impl<'r> Responder<'r, 'static> for CsvDownload {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let disposition = format!(
            "attachment; filename*=UTF-8''{}",
            percent_encode(&self.filename)
        );

        Response::build()
            .raw_header("Content-Type", "text/csv; charset=utf-8")
            .raw_header("Content-Disposition", disposition)
            .sized_body(self.body.len(), Cursor::new(self.body))
            .ok()
    }
}

fn percent_encode(value: &str) -> String {
    let mut encoded = String::new();
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}
