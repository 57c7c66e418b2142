use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// トリアージエリア。重症度の高い順に 赤 > 黄 > 緑 > 黒 の4区分。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriageArea {
    /// 緊急
    #[serde(rename = "赤")]
    Red,
    /// 準緊急
    #[serde(rename = "黄")]
    Yellow,
    /// 軽症
    #[serde(rename = "緑")]
    Green,
    /// 不搬送
    #[serde(rename = "黒")]
    Black,
}

impl TriageArea {
    /// エリア表示順（ソート・集計で使用）
    pub const ALL: [TriageArea; 4] = [
        TriageArea::Red,
        TriageArea::Yellow,
        TriageArea::Green,
        TriageArea::Black,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TriageArea::Red => "赤",
            TriageArea::Yellow => "黄",
            TriageArea::Green => "緑",
            TriageArea::Black => "黒",
        }
    }

    pub fn from_label(label: &str) -> Option<TriageArea> {
        match label {
            "赤" => Some(TriageArea::Red),
            "黄" => Some(TriageArea::Yellow),
            "緑" => Some(TriageArea::Green),
            "黒" => Some(TriageArea::Black),
            _ => None,
        }
    }

    /// ソート用の優先順位 (赤=0 黄=1 緑=2 黒=3)
    pub fn priority(&self) -> u8 {
        match self {
            TriageArea::Red => 0,
            TriageArea::Yellow => 1,
            TriageArea::Green => 2,
            TriageArea::Black => 3,
        }
    }
}

impl Default for TriageArea {
    fn default() -> Self {
        TriageArea::Red
    }
}

/// 傷病者レコード。
/// ストレージには `patients` キー配下にJSON配列として保存されます
/// （フィールド名はcamelCase）。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRecord {
    /// 登録時刻(ミリ秒)由来の一意なID。不変。
    pub id: i64,

    /// トリアージ番号。正規化済みの3桁ゼロ埋め形式で保持。
    pub triage_number: String,

    /// 氏名 (任意。空のときは「不明」と表示)
    #[serde(default)]
    pub name: String,

    /// 患者ID (必須、8桁)
    pub patient_id: String,

    /// 性別 (男性/女性/その他/不明 または未選択)
    #[serde(default)]
    pub gender: String,

    /// 年齢 (任意の数値入力)
    #[serde(default)]
    pub age: String,

    /// トリアージエリア
    pub area: TriageArea,

    /// 傷病名 (任意)
    #[serde(default)]
    pub injury: String,

    /// 処置状況 (任意)
    #[serde(default)]
    pub treatment: String,

    /// 登録日時。作成時に設定され、以後変化しない。
    pub created_at: DateTime<Utc>,

    /// 更新日時。作成時と毎回の編集・上書きで更新される。
    pub updated_at: DateTime<Utc>,
}

/// 空欄フィールドの表示プレースホルダ
pub const UNKNOWN: &str = "不明";
pub const UNRECORDED: &str = "未記入";

impl PatientRecord {
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            UNKNOWN
        } else {
            &self.name
        }
    }

    pub fn display_gender(&self) -> &str {
        if self.gender.is_empty() {
            UNKNOWN
        } else {
            &self.gender
        }
    }

    pub fn display_age(&self) -> &str {
        if self.age.is_empty() {
            UNKNOWN
        } else {
            &self.age
        }
    }

    pub fn display_injury(&self) -> &str {
        if self.injury.is_empty() {
            UNKNOWN
        } else {
            &self.injury
        }
    }

    pub fn display_treatment(&self) -> &str {
        if self.treatment.is_empty() {
            UNRECORDED
        } else {
            &self.treatment
        }
    }
}

/// エリアごとの患者数を集計する
pub fn area_stats(patients: &[PatientRecord]) -> [(TriageArea, usize); 4] {
    let mut stats = TriageArea::ALL.map(|area| (area, 0));
    for patient in patients {
        stats[patient.area.priority() as usize].1 += 1;
    }
    stats
}
