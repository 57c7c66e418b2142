pub mod patient_service;
pub mod storage_service;
