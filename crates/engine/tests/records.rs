use chrono::NaiveDate;
use sea_orm::Database;

use engine::{
    Engine, EngineError, MemberFilter, MemberUpdate, MonthRange, NewMember, NewRecord, RecordKind,
};
use migration::MigratorTrait;

async fn engine() -> Engine {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    Engine::builder().database(db).build()
}

fn record(category: &str, amount_cents: i64, date: (i32, u32, u32)) -> NewRecord {
    NewRecord {
        kind: RecordKind::Expense,
        category: category.to_string(),
        amount_cents,
        date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
        remark: "test".to_string(),
        member_id: None,
    }
}

#[tokio::test]
async fn create_record_persists_and_returns_the_row() {
    let engine = engine().await;

    let model = engine
        .create_record(record("饮食", 45_80, (2026, 1, 5)))
        .await
        .unwrap();

    assert!(model.id > 0);
    assert_eq!(model.kind, "支出");
    assert_eq!(model.category, "饮食");
    assert_eq!(model.amount_cents, 45_80);
}

#[tokio::test]
async fn create_record_rejects_category_outside_the_kind() {
    let engine = engine().await;

    let err = engine
        .create_record(record("工资", 100_00, (2026, 1, 5)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn import_collects_row_errors_without_blocking_valid_rows() {
    let engine = engine().await;

    let batch = vec![
        record("饮食", 45_80, (2026, 1, 5)),
        record("饮食", 0, (2026, 1, 5)),
        record("交通", 12_00, (2026, 1, 6)),
    ];
    let outcome = engine.import_records(batch).await.unwrap();

    assert_eq!(outcome.inserted, 2);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].index, 1);
}

#[tokio::test]
async fn import_with_no_valid_rows_is_an_error() {
    let engine = engine().await;

    let batch = vec![record("饮食", 0, (2026, 1, 5))];
    let err = engine.import_records(batch).await.unwrap_err();
    assert!(matches!(err, EngineError::NoValidRows(_)));
}

#[tokio::test]
async fn empty_month_report_is_dense_and_zero_filled() {
    let engine = engine().await;

    let range = MonthRange::parse("2026-04", "2026-04").unwrap();
    let report = engine
        .records_report(range, MemberFilter::All)
        .await
        .unwrap();

    assert_eq!(report.buckets.len(), 30);
    assert!(report.buckets.iter().all(|b| b.total_cents == 0));
}

#[tokio::test]
async fn multi_month_report_buckets_by_month() {
    let engine = engine().await;
    engine
        .create_record(record("饮食", 45_80, (2026, 1, 5)))
        .await
        .unwrap();
    engine
        .create_record(record("饮食", 10_00, (2026, 2, 5)))
        .await
        .unwrap();

    let range = MonthRange::parse("2026-01", "2026-03").unwrap();
    let report = engine
        .records_report(range, MemberFilter::All)
        .await
        .unwrap();

    assert_eq!(report.buckets.len(), 3);
    assert_eq!(report.buckets[0].total_cents, 45_80);
    assert_eq!(report.buckets[1].total_cents, 10_00);
    assert_eq!(report.buckets[2].total_cents, 0);
}

#[tokio::test]
async fn report_member_filter_narrows_rows() {
    let engine = engine().await;
    let member = engine
        .create_member(NewMember {
            name: "小明".to_string(),
            ..NewMember::default()
        })
        .await
        .unwrap();

    let mut attributed = record("饮食", 45_80, (2026, 1, 5));
    attributed.member_id = Some(member.id);
    engine.create_record(attributed).await.unwrap();
    engine
        .create_record(record("交通", 3_50, (2026, 1, 6)))
        .await
        .unwrap();

    let range = MonthRange::parse("2026-01", "2026-01").unwrap();

    let theirs = engine
        .records_report(range, MemberFilter::Member(member.id))
        .await
        .unwrap();
    let total: i64 = theirs.buckets.iter().map(|b| b.total_cents).sum();
    assert_eq!(total, 45_80);

    let unattributed = engine
        .records_report(range, MemberFilter::Unattributed)
        .await
        .unwrap();
    let total: i64 = unattributed.buckets.iter().map(|b| b.total_cents).sum();
    assert_eq!(total, 3_50);
}

#[tokio::test]
async fn member_names_are_unique_and_colors_auto_assigned() {
    let engine = engine().await;

    let first = engine
        .create_member(NewMember {
            name: "小明".to_string(),
            ..NewMember::default()
        })
        .await
        .unwrap();
    let second = engine
        .create_member(NewMember {
            name: "小红".to_string(),
            ..NewMember::default()
        })
        .await
        .unwrap();
    assert_ne!(first.color, second.color);

    let err = engine
        .create_member(NewMember {
            name: "小明".to_string(),
            ..NewMember::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));
}

#[tokio::test]
async fn nickname_can_be_set_and_cleared() {
    let engine = engine().await;
    let member = engine
        .create_member(NewMember {
            name: "小明".to_string(),
            nickname: Some("明明".to_string()),
            ..NewMember::default()
        })
        .await
        .unwrap();
    assert_eq!(member.nickname.as_deref(), Some("明明"));

    let updated = engine
        .update_member(
            member.id,
            MemberUpdate {
                nickname: Some(None),
                ..MemberUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.nickname, None);

    // An absent field leaves the previous value alone.
    let updated = engine
        .update_member(
            member.id,
            MemberUpdate {
                nickname: Some(Some("小小明".to_string())),
                ..MemberUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.nickname.as_deref(), Some("小小明"));

    let untouched = engine
        .update_member(
            member.id,
            MemberUpdate {
                color: Some("#45B7D1".to_string()),
                ..MemberUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(untouched.nickname.as_deref(), Some("小小明"));
}

#[tokio::test]
async fn deactivated_members_drop_out_of_the_default_listing() {
    let engine = engine().await;
    let member = engine
        .create_member(NewMember {
            name: "小明".to_string(),
            ..NewMember::default()
        })
        .await
        .unwrap();

    engine.deactivate_member(member.id).await.unwrap();

    assert!(engine.list_members(false).await.unwrap().is_empty());
    assert_eq!(engine.list_members(true).await.unwrap().len(), 1);
}

#[tokio::test]
async fn deleting_a_member_keeps_their_records_unattributed() {
    let engine = engine().await;
    let member = engine
        .create_member(NewMember {
            name: "小明".to_string(),
            ..NewMember::default()
        })
        .await
        .unwrap();

    let mut row = record("饮食", 45_80, (2026, 1, 5));
    row.member_id = Some(member.id);
    engine.create_record(row).await.unwrap();

    engine.delete_member(member.id).await.unwrap();

    let range = MonthRange::parse("2026-01", "2026-01").unwrap();
    let report = engine
        .records_report(range, MemberFilter::Unattributed)
        .await
        .unwrap();
    let total: i64 = report.buckets.iter().map(|b| b.total_cents).sum();
    assert_eq!(total, 45_80);
}

#[tokio::test]
async fn member_rename_clash_is_rejected() {
    let engine = engine().await;
    engine
        .create_member(NewMember {
            name: "小明".to_string(),
            ..NewMember::default()
        })
        .await
        .unwrap();
    let other = engine
        .create_member(NewMember {
            name: "小红".to_string(),
            ..NewMember::default()
        })
        .await
        .unwrap();

    let err = engine
        .update_member(
            other.id,
            MemberUpdate {
                name: Some("小明".to_string()),
                ..MemberUpdate::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));
}
