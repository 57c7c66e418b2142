use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;

use crate::errors::AppError;
use crate::models::patient::{PatientRecord, TriageArea};
use crate::services::storage_service::StorageService;
use crate::validation::normalize_triage_number;

/// 傷病者リストの保存先キー
pub const STORAGE_KEY: &str = "patients";

/// メモリ上の傷病者リスト。
/// 各ハンドラとバックグラウンド更新タスクから共有されます。
/// 変更は「新しいリストを組み立てて保存成功後に差し替える」方式で、
/// 保存に失敗した変更がメモリに残ることはありません。
#[derive(Clone)]
pub struct PatientStore {
    patients: Arc<RwLock<Vec<PatientRecord>>>,
    last_update: Arc<RwLock<Option<DateTime<Utc>>>>,
    auto_refresh: Arc<AtomicBool>,
}

impl PatientStore {
    pub fn new() -> Self {
        Self {
            patients: Arc::new(RwLock::new(Vec::new())),
            // 最終更新マーカーは起動時刻から始まる
            last_update: Arc::new(RwLock::new(Some(Utc::now()))),
            // 自動更新は初期状態で有効
            auto_refresh: Arc::new(AtomicBool::new(true)),
        }
    }

    /// 現在のリストのコピーを返す
    pub fn snapshot(&self) -> Vec<PatientRecord> {
        self.patients.read().expect("patients lock poisoned").clone()
    }

    fn replace(&self, patients: Vec<PatientRecord>) {
        *self.patients.write().expect("patients lock poisoned") = patients;
        *self.last_update.write().expect("last_update lock poisoned") = Some(Utc::now());
    }

    /// 最終更新マーカー（ストレージと同期した時刻）
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        *self.last_update.read().expect("last_update lock poisoned")
    }

    pub fn auto_refresh_enabled(&self) -> bool {
        self.auto_refresh.load(Ordering::Relaxed)
    }

    pub fn set_auto_refresh(&self, enabled: bool) {
        self.auto_refresh.store(enabled, Ordering::Relaxed);
    }
}

impl Default for PatientStore {
    fn default() -> Self {
        Self::new()
    }
}

/// フォームから受け取った登録・更新内容。
/// トリアージ番号はサービス側で正規化されます。
#[derive(Clone, Debug)]
pub struct PatientInput {
    pub triage_number: String,
    pub name: String,
    pub patient_id: String,
    pub gender: String,
    pub age: String,
    pub area: TriageArea,
    pub injury: String,
    pub treatment: String,
}

/// 傷病者リストのビジネスロジックを集約するサービス。
pub struct PatientService;

impl PatientService {
    /// ストレージからリストを読み込み、メモリ上の状態を置き換える。
    /// 値が保存されていない場合は何もしない。
    pub async fn load(db: &DatabaseConnection, store: &PatientStore) -> Result<(), AppError> {
        if let Some(value) = StorageService::get(db, STORAGE_KEY).await? {
            let patients: Vec<PatientRecord> = serde_json::from_str(&value)?;
            store.replace(patients);
        }
        Ok(())
    }

    /// リスト全体をストレージに書き込み、成功したらメモリ上の状態を差し替える。
    pub async fn save(
        db: &DatabaseConnection,
        store: &PatientStore,
        new_patients: Vec<PatientRecord>,
    ) -> Result<(), AppError> {
        let payload = serde_json::to_string(&new_patients)?;
        StorageService::set(db, STORAGE_KEY, payload).await?;
        store.replace(new_patients);
        Ok(())
    }

    /// 患者IDまたは正規化したトリアージ番号が一致する既存レコードを探す。
    /// `exclude_id` は編集中のレコード自身を除外するために使う。
    pub fn check_duplicate<'a>(
        patients: &'a [PatientRecord],
        patient_id: &str,
        triage_number: &str,
        exclude_id: Option<i64>,
    ) -> Option<&'a PatientRecord> {
        let normalized = normalize_triage_number(triage_number);
        patients.iter().find(|p| {
            Some(p.id) != exclude_id
                && (p.patient_id == patient_id
                    || normalize_triage_number(&p.triage_number) == normalized)
        })
    }

    /// 新規レコードのIDを採番する。現在時刻(ミリ秒)を基準に、
    /// 既存IDと衝突する間はインクリメントして一意性を保つ。
    fn allocate_id(patients: &[PatientRecord], now: DateTime<Utc>) -> i64 {
        let mut id = now.timestamp_millis();
        while patients.iter().any(|p| p.id == id) {
            id += 1;
        }
        id
    }

    /// 新規登録。`created_at == updated_at` で追加する。
    pub async fn register(
        db: &DatabaseConnection,
        store: &PatientStore,
        input: PatientInput,
    ) -> Result<PatientRecord, AppError> {
        let now = Utc::now();
        let patients = store.snapshot();

        let record = PatientRecord {
            id: Self::allocate_id(&patients, now),
            triage_number: normalize_triage_number(&input.triage_number),
            name: input.name,
            patient_id: input.patient_id,
            gender: input.gender,
            age: input.age,
            area: input.area,
            injury: input.injury,
            treatment: input.treatment,
            created_at: now,
            updated_at: now,
        };

        let mut new_patients = patients;
        new_patients.push(record.clone());
        Self::save(db, store, new_patients).await?;

        Ok(record)
    }

    /// 既存レコードの更新。IDと `created_at` は保持し、`updated_at` を進める。
    /// 編集確定と重複時の上書きの両方がこの操作に行き着く。
    pub async fn update(
        db: &DatabaseConnection,
        store: &PatientStore,
        id: i64,
        input: PatientInput,
    ) -> Result<PatientRecord, AppError> {
        let now = Utc::now();
        let mut patients = store.snapshot();

        let target = patients
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(AppError::NotFound)?;

        target.triage_number = normalize_triage_number(&input.triage_number);
        target.name = input.name;
        target.patient_id = input.patient_id;
        target.gender = input.gender;
        target.age = input.age;
        target.area = input.area;
        target.injury = input.injury;
        target.treatment = input.treatment;
        target.updated_at = now;
        let record = target.clone();

        Self::save(db, store, patients).await?;

        Ok(record)
    }

    /// 対象レコードを1件削除する。
    pub async fn delete(
        db: &DatabaseConnection,
        store: &PatientStore,
        id: i64,
    ) -> Result<PatientRecord, AppError> {
        let patients = store.snapshot();
        let removed = patients
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(AppError::NotFound)?;

        let remaining: Vec<PatientRecord> = patients.into_iter().filter(|p| p.id != id).collect();
        Self::save(db, store, remaining).await?;

        Ok(removed)
    }

    /// 全件削除。空のリストを保存する。
    pub async fn clear(db: &DatabaseConnection, store: &PatientStore) -> Result<(), AppError> {
        Self::save(db, store, Vec::new()).await
    }

    /// IDでレコードを探す
    pub fn find(store: &PatientStore, id: i64) -> Option<PatientRecord> {
        store.snapshot().into_iter().find(|p| p.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(id: i64, patient_id: &str, triage_number: &str) -> PatientRecord {
        let now = Utc.with_ymd_and_hms(2026, 8, 6, 12, 0, 0).unwrap();
        PatientRecord {
            id,
            triage_number: triage_number.to_owned(),
            name: String::new(),
            patient_id: patient_id.to_owned(),
            gender: String::new(),
            age: String::new(),
            area: TriageArea::Red,
            injury: String::new(),
            treatment: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_duplicate_by_patient_id() {
        let patients = vec![record(1, "10000001", "001")];
        let found = PatientService::check_duplicate(&patients, "10000001", "999", None);
        assert_eq!(found.map(|p| p.id), Some(1));
    }

    #[test]
    fn test_duplicate_by_normalized_triage_number() {
        // 入力形式が違っても正規形が同じなら重複
        let patients = vec![record(1, "10000001", "007")];
        let found = PatientService::check_duplicate(&patients, "20000002", "7", None);
        assert_eq!(found.map(|p| p.id), Some(1));
    }

    #[test]
    fn test_duplicate_excludes_record_being_edited() {
        let patients = vec![record(1, "10000001", "007")];
        let found = PatientService::check_duplicate(&patients, "10000001", "007", Some(1));
        assert!(found.is_none());
    }

    #[test]
    fn test_no_duplicate_when_nothing_matches() {
        let patients = vec![record(1, "10000001", "007")];
        let found = PatientService::check_duplicate(&patients, "20000002", "8", None);
        assert!(found.is_none());
    }

    #[test]
    fn test_allocate_id_bumps_on_collision() {
        let now = Utc.with_ymd_and_hms(2026, 8, 6, 12, 0, 0).unwrap();
        let base = now.timestamp_millis();
        let patients = vec![record(base, "10000001", "001"), record(base + 1, "20000002", "002")];
        assert_eq!(PatientService::allocate_id(&patients, now), base + 2);
    }

    #[test]
    fn test_store_defaults_to_auto_refresh_enabled() {
        let store = PatientStore::new();
        assert!(store.auto_refresh_enabled());
        assert!(store.last_update().is_some());
        store.set_auto_refresh(false);
        assert!(!store.auto_refresh_enabled());
    }
}
