use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 外部キーバリューストレージのテーブル定義。
/// 傷病者リスト全体を1つのJSONドキュメントとして `patients` キーに保存します。
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "storage")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,
    pub value: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
