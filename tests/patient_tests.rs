use rocket::http::{ContentType, Status};

mod common;

#[test]
fn test_index_redirects_to_patients() {
    let client = common::setup();

    let response = client.get("/").dispatch();
    assert_eq!(response.status(), Status::SeeOther);
}

#[test]
fn test_list_starts_empty() {
    let client = common::setup();

    let response = client.get("/patients").dispatch();
    assert_eq!(response.status(), Status::Ok);
    let body = response.into_string().unwrap();
    assert!(body.contains("災害時トリアージ管理システム"));
    assert!(body.contains("登録されている傷病者はいません"));
}

#[test]
fn test_register_normalizes_triage_number() {
    let client = common::setup();
    common::register_patient(&client, "7", "", "10000001");

    // 保存されたレコードは正規化済み
    let stored = common::stored_patients(&client);
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].triage_number, "007");
    assert_eq!(stored[0].patient_id, "10000001");
    assert_eq!(stored[0].created_at, stored[0].updated_at);

    // 一覧には表示形式で出る
    let response = client.get("/patients").dispatch();
    let body = response.into_string().unwrap();
    assert!(body.contains("TCH-007"));
    assert!(body.contains("新しい患者を登録しました"));
}

#[test]
fn test_register_rejects_wrong_patient_id_length() {
    let client = common::setup();

    for bad in ["", "1234567", "123456789"] {
        let body = common::patient_form_body(&client, "7", "", bad, "赤");
        let response = client
            .post("/patients/create")
            .header(ContentType::Form)
            .body(body)
            .dispatch();

        // フォームが再表示され、何も保存されない
        assert_eq!(response.status(), Status::Ok);
        let page = response.into_string().unwrap();
        if bad.is_empty() {
            assert!(page.contains("トリアージ番号と患者IDは必須項目です"));
        } else {
            assert!(page.contains("患者IDは8桁で入力してください"));
        }
        assert!(common::stored_patients(&client).is_empty());
    }
}

#[test]
fn test_register_rejects_missing_triage_number() {
    let client = common::setup();

    let body = common::patient_form_body(&client, "", "", "10000001", "赤");
    let response = client
        .post("/patients/create")
        .header(ContentType::Form)
        .body(body)
        .dispatch();

    assert_eq!(response.status(), Status::Ok);
    let page = response.into_string().unwrap();
    assert!(page.contains("トリアージ番号と患者IDは必須項目です"));
    assert!(common::stored_patients(&client).is_empty());
}

#[test]
fn test_duplicate_triage_number_shows_confirmation() {
    let client = common::setup();
    common::register_patient(&client, "7", "山田太郎", "10000001");
    let before = common::stored_patients(&client);

    // 入力形式が違っても正規形が同じなら重複扱い
    let body = common::patient_form_body(&client, "007", "", "20000002", "黄");
    let response = client
        .post("/patients/create")
        .header(ContentType::Form)
        .body(body)
        .dispatch();

    assert_eq!(response.status(), Status::Ok);
    let page = response.into_string().unwrap();
    assert!(page.contains("重複データの警告"));
    assert!(page.contains("山田太郎"));
    assert!(page.contains("10000001"));

    // 確認ページの時点では何も変わらない（キャンセル = 何もしない）
    assert_eq!(common::stored_patients(&client), before);
}

#[test]
fn test_duplicate_overwrite_keeps_id_and_created_at() {
    let client = common::setup();
    common::register_patient(&client, "7", "山田太郎", "10000001");
    let original = common::stored_patients(&client)[0].clone();

    // 重複を承知で上書きを実行する
    let token = common::csrf_token(&client);
    let body = format!(
        "triage_number=007&name=&patient_id=20000002&gender=&age=&area={}&injury=&treatment=&duplicate_id={}&csrf_token={}",
        common::form_encode("黄"),
        original.id,
        token,
    );
    let response = client
        .post("/patients/overwrite")
        .header(ContentType::Form)
        .body(body)
        .dispatch();
    assert_eq!(response.status(), Status::SeeOther);

    let after = common::stored_patients(&client);
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].id, original.id);
    assert_eq!(after[0].created_at, original.created_at);
    assert_eq!(after[0].patient_id, "20000002");
    assert!(after[0].updated_at >= original.updated_at);

    let response = client.get("/patients").dispatch();
    let body = response.into_string().unwrap();
    assert!(body.contains("患者情報を上書きしました"));
}

#[test]
fn test_edit_preserves_created_at_and_advances_updated_at() {
    let client = common::setup();
    common::register_patient(&client, "7", "", "10000001");
    let original = common::stored_patients(&client)[0].clone();

    // 編集フォームには既存の内容が入っている
    let response = client
        .get(format!("/patients/edit/{}", original.id))
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    let page = response.into_string().unwrap();
    assert!(page.contains("編集モード"));
    assert!(page.contains("007"));

    // 同じ番号のまま氏名だけ変更する（自分自身は重複にならない）
    let body = common::patient_form_body(&client, "007", "佐藤花子", "10000001", "緑");
    let response = client
        .post(format!("/patients/edit/{}", original.id))
        .header(ContentType::Form)
        .body(body)
        .dispatch();
    assert_eq!(response.status(), Status::SeeOther);

    let after = common::stored_patients(&client);
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].id, original.id);
    assert_eq!(after[0].name, "佐藤花子");
    assert_eq!(after[0].created_at, original.created_at);
    assert!(after[0].updated_at >= original.updated_at);
}

#[test]
fn test_edit_duplicate_against_other_record_updates_edited_one() {
    let client = common::setup();
    common::register_patient(&client, "7", "", "10000001");
    common::register_patient(&client, "8", "", "20000002");
    let stored = common::stored_patients(&client);
    let first = stored.iter().find(|p| p.patient_id == "10000001").unwrap().clone();
    let second = stored.iter().find(|p| p.patient_id == "20000002").unwrap().clone();

    // 2人目を1人目と同じトリアージ番号に編集 → 重複確認が出る
    let body = common::patient_form_body(&client, "007", "", "20000002", "赤");
    let response = client
        .post(format!("/patients/edit/{}", second.id))
        .header(ContentType::Form)
        .body(body)
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    let page = response.into_string().unwrap();
    assert!(page.contains("重複データの警告"));

    // 編集中の上書きは編集対象のレコードを更新する
    let token = common::csrf_token(&client);
    let body = format!(
        "triage_number=007&name=&patient_id=20000002&gender=&age=&area={}&injury=&treatment=&duplicate_id={}&editing_id={}&csrf_token={}",
        common::form_encode("赤"),
        first.id,
        second.id,
        token,
    );
    let response = client
        .post("/patients/overwrite")
        .header(ContentType::Form)
        .body(body)
        .dispatch();
    assert_eq!(response.status(), Status::SeeOther);

    let after = common::stored_patients(&client);
    assert_eq!(after.len(), 2);
    let edited = after.iter().find(|p| p.id == second.id).unwrap();
    assert_eq!(edited.triage_number, "007");
    // 衝突相手はそのまま残る
    let other = after.iter().find(|p| p.id == first.id).unwrap();
    assert_eq!(other.patient_id, "10000001");
}

#[test]
fn test_delete_requires_confirmation() {
    let client = common::setup();
    common::register_patient(&client, "7", "", "10000001");
    let id = common::stored_patients(&client)[0].id;

    // 確認ページの表示だけでは削除されない
    let response = client.get(format!("/patients/delete/{}", id)).dispatch();
    assert_eq!(response.status(), Status::Ok);
    let page = response.into_string().unwrap();
    assert!(page.contains("削除の確認"));
    assert!(page.contains("10000001"));
    assert_eq!(common::stored_patients(&client).len(), 1);

    // 確認後のPOSTで削除される
    let response = client.post(format!("/patients/delete/{}", id)).dispatch();
    assert_eq!(response.status(), Status::SeeOther);
    assert!(common::stored_patients(&client).is_empty());
}

#[test]
fn test_delete_removes_only_target() {
    let client = common::setup();
    common::register_patient(&client, "7", "", "10000001");
    common::register_patient(&client, "8", "", "20000002");
    let stored = common::stored_patients(&client);
    let target = stored.iter().find(|p| p.patient_id == "10000001").unwrap().id;

    let response = client.post(format!("/patients/delete/{}", target)).dispatch();
    assert_eq!(response.status(), Status::SeeOther);

    let remaining = common::stored_patients(&client);
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].patient_id, "20000002");
}

#[test]
fn test_delete_missing_record_reports_error() {
    let client = common::setup();

    let response = client.post("/patients/delete/999").dispatch();
    assert_eq!(response.status(), Status::SeeOther);

    let response = client.get("/patients").dispatch();
    let body = response.into_string().unwrap();
    assert!(body.contains("傷病者が見つかりません"));
}

#[test]
fn test_clear_all_requires_confirmation() {
    let client = common::setup();
    common::register_patient(&client, "7", "", "10000001");
    common::register_patient(&client, "8", "", "20000002");

    let response = client.get("/patients/clear").dispatch();
    assert_eq!(response.status(), Status::Ok);
    let page = response.into_string().unwrap();
    assert!(page.contains("すべてのデータを削除しますか？"));
    assert_eq!(common::stored_patients(&client).len(), 2);

    let response = client.post("/patients/clear").dispatch();
    assert_eq!(response.status(), Status::SeeOther);
    assert!(common::stored_patients(&client).is_empty());

    let response = client.get("/patients").dispatch();
    let body = response.into_string().unwrap();
    assert!(body.contains("すべてのデータを削除しました"));
}

#[test]
fn test_area_filter_and_search_compose() {
    let client = common::setup();
    let body = common::patient_form_body(&client, "1", "", "10000001", "赤");
    client.post("/patients/create").header(ContentType::Form).body(body).dispatch();
    let body = common::patient_form_body(&client, "2", "", "20000002", "黄");
    client.post("/patients/create").header(ContentType::Form).body(body).dispatch();

    // エリアフィルタ
    let url = format!("/patients?mode=headquarters&area={}", common::form_encode("赤"));
    let response = client.get(url).dispatch();
    let page = response.into_string().unwrap();
    assert!(page.contains("10000001"));
    assert!(!page.contains("20000002"));

    // エリアフィルタ + 検索 (AND)
    let url = format!(
        "/patients?mode=headquarters&area={}&q=20000002",
        common::form_encode("赤")
    );
    let response = client.get(url).dispatch();
    let page = response.into_string().unwrap();
    assert!(page.contains("検索結果が見つかりません"));
}

#[test]
fn test_manual_refresh_reloads_saved_roster() {
    let client = common::setup();
    common::register_patient(&client, "7", "", "10000001");

    let response = client.post("/patients/refresh").dispatch();
    assert_eq!(response.status(), Status::SeeOther);

    // ストレージから読み直しても同じ内容が出る
    let response = client.get("/patients").dispatch();
    let body = response.into_string().unwrap();
    assert!(body.contains("TCH-007"));
    assert!(body.contains("10000001"));
}

#[test]
fn test_auto_refresh_toggle() {
    let client = common::setup();

    // 初期状態は有効
    let response = client.get("/patients").dispatch();
    let body = response.into_string().unwrap();
    assert!(body.contains("checked"));

    let response = client
        .post("/patients/autorefresh")
        .header(ContentType::Form)
        .body("")
        .dispatch();
    assert_eq!(response.status(), Status::SeeOther);

    let response = client.get("/patients").dispatch();
    let body = response.into_string().unwrap();
    assert!(!body.contains("checked"));
}
