use chrono::{DateTime, Utc};

use crate::models::patient::{PatientRecord, TriageArea, UNKNOWN};
use crate::validation::format_triage_number;

/// 一覧のソートキー
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortKey {
    /// 更新順（新しいものが先頭）
    Updated,
    /// 氏名順
    Name,
    /// エリア順 (赤 → 黄 → 緑 → 黒)
    Area,
}

impl SortKey {
    /// クエリパラメータの値から変換。不明な値は更新順にフォールバック。
    pub fn from_param(value: &str) -> SortKey {
        match value {
            "name" => SortKey::Name,
            "area" => SortKey::Area,
            _ => SortKey::Updated,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Updated => "updated",
            SortKey::Name => "name",
            SortKey::Area => "area",
        }
    }
}

/// 表示用のリストを導出する純関数。
/// エリアフィルタ → 検索 → ソートの順に適用する（フィルタと検索はAND）。
pub fn project(
    patients: &[PatientRecord],
    area: Option<TriageArea>,
    query: &str,
    sort: SortKey,
) -> Vec<PatientRecord> {
    let mut filtered: Vec<PatientRecord> = patients
        .iter()
        .filter(|p| area.map_or(true, |selected| p.area == selected))
        .filter(|p| query.is_empty() || matches_query(p, query))
        .cloned()
        .collect();

    match sort {
        SortKey::Updated => filtered.sort_by(|a, b| b.updated_at.cmp(&a.updated_at)),
        SortKey::Name => filtered.sort_by(|a, b| {
            let a_name = if a.name.is_empty() { UNKNOWN } else { &a.name };
            let b_name = if b.name.is_empty() { UNKNOWN } else { &b.name };
            a_name.cmp(b_name)
        }),
        SortKey::Area => filtered.sort_by_key(|p| p.area.priority()),
    }

    filtered
}

/// 氏名・傷病名・表示形式のトリアージ番号・患者IDのいずれかに
/// 部分一致すれば検索にヒットする。空の氏名・傷病名はヒットしない。
fn matches_query(patient: &PatientRecord, query: &str) -> bool {
    (!patient.name.is_empty() && patient.name.contains(query))
        || (!patient.injury.is_empty() && patient.injury.contains(query))
        || format_triage_number(&patient.triage_number).contains(query)
        || patient.patient_id.contains(query)
}

/// 経過時間の表示 (今 / N分前 / N時間前 / N日前)
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff_mins = (now - then).num_minutes();

    if diff_mins < 1 {
        "今".to_owned()
    } else if diff_mins < 60 {
        format!("{}分前", diff_mins)
    } else if diff_mins < 1440 {
        format!("{}時間前", diff_mins / 60)
    } else {
        format!("{}日前", diff_mins / 1440)
    }
}
