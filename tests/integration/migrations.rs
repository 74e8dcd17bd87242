use haulscout_core::{Database, SearchCriteria};
use tempfile::tempdir;

#[tokio::test]
async fn test_rollback_and_reapply() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().join("nested").join("haulscout.db");
    let db = Database::new(&db_path).await?;

    assert_eq!(db.get_applied_migrations().await?, vec![1, 2, 3, 4, 5]);

    db.rollback(1).await?;
    assert_eq!(db.get_applied_migrations().await?, vec![1]);

    db.migrate().await?;
    db.migrate().await?;
    assert_eq!(db.get_applied_migrations().await?, vec![1, 2, 3, 4, 5]);

    Ok(())
}

#[tokio::test]
async fn test_data_survives_reopen() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().join("haulscout.db");

    let id = {
        let db = Database::new(&db_path).await?;
        let mut criteria = SearchCriteria { origin_city: Some("Gary".to_string()), ..SearchCriteria::new("user-1") };
        db.create_criteria(&mut criteria).await?
    };

    let db = Database::new(&db_path).await?;
    let criteria = db.get_criteria(id).await?.ok_or("criteria missing after reopen")?;
    assert_eq!(criteria.origin_city.as_deref(), Some("Gary"));

    Ok(())
}
