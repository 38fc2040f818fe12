// ==========================================
// Roster CSV import integration tests
// ==========================================

mod helpers;

use std::io::Write;

use helpers::api_test_helper::PipelineTestEnv;
use tempfile::NamedTempFile;
use vitalvida_sync::domain::types::BinStatus;
use vitalvida_sync::domain::Zone;
use vitalvida_sync::importer::ImportError;

fn roster(content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[tokio::test]
async fn test_import_creates_agents_and_bins() {
    let env = PipelineTestEnv::new();
    let file = roster(
        "da_code,full_name,phone,location,rating\n\
         DA-301,Aisha Bello,08031110001,Sabon Gari Kano,4.1\n\
         da-302,Chidi Obi,+2348031110002,\"New Haven, Enugu\",3.7\n",
    );

    let summary = env.importer.import_csv(file.path(), "ops_import").await.unwrap();
    assert_eq!(summary.created, 2);
    assert_eq!(summary.updated, 0);
    assert!(summary.rejected.is_empty());

    env.drain().await;

    let kano = env.agent_repo.find_by_da_code("DA-301").unwrap().unwrap();
    assert_eq!(kano.zone, Zone::Kano);
    let enugu = env.agent_repo.find_by_da_code("DA-302").unwrap().unwrap();
    assert_eq!(enugu.zone, Zone::Enugu);

    let bin = env.bin_repo.find_by_da_code("DA-302").unwrap().unwrap();
    assert_eq!(bin.status, BinStatus::Active);
}

#[tokio::test]
async fn test_reimport_updates_changed_rows_only() {
    let env = PipelineTestEnv::new();
    let first = roster(
        "da_code,full_name,phone,location,rating\n\
         DA-310,Bisi Ade,08031110010,Yaba,4.0\n\
         DA-311,Uche Nwosu,08031110011,Garki Abuja,4.2\n",
    );
    env.importer.import_csv(first.path(), "ops_import").await.unwrap();
    env.drain().await;

    let second = roster(
        "da_code,full_name,phone,location,rating\n\
         DA-310,Bisi Ade,0803 111 0010,Yaba,4.0\n\
         DA-311,Uche Nwosu,08031110011,Lekki,4.2\n",
    );
    let summary = env.importer.import_csv(second.path(), "ops_import").await.unwrap();
    assert_eq!(summary.created, 0);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.unchanged, 1);
    assert_eq!(summary.total(), 2);

    env.drain().await;
    let bin = env.bin_repo.find_by_da_code("DA-311").unwrap().unwrap();
    assert_eq!(bin.zone, Zone::LagosIsland);
}

#[tokio::test]
async fn test_invalid_rows_are_reported_and_skipped() {
    let env = PipelineTestEnv::new();
    let file = roster(
        "da_code,full_name,phone,location,rating\n\
         DA-320,Good Row,08031110020,Ikeja,4.0\n\
         DA-321,Bad Phone,12345,Ikeja,4.0\n\
         DA-322,Bad Rating,08031110022,Ikeja,seven\n\
         DA 323,Bad Code,08031110023,Ikeja,2.0\n",
    );

    let summary = env.importer.import_csv(file.path(), "ops_import").await.unwrap();
    assert_eq!(summary.created, 1);
    assert_eq!(summary.rejected.len(), 3);

    let lines: Vec<usize> = summary.rejected.iter().map(|r| r.line).collect();
    assert_eq!(lines, vec![3, 4, 5]);
    assert!(summary.rejected[0].reason.contains("phone"));
    assert!(summary.rejected[1].reason.contains("rating"));
    assert!(summary.rejected[2].reason.contains("da_code"));

    assert!(env.agent_repo.find_by_da_code("DA-321").unwrap().is_none());
}

#[tokio::test]
async fn test_missing_columns_abort_import() {
    let env = PipelineTestEnv::new();
    let file = roster("da_code,full_name\nDA-330,No Phone\n");

    let err = env.importer.import_csv(file.path(), "ops_import").await.unwrap_err();
    assert!(matches!(err, ImportError::MissingColumns(_)));
    assert_eq!(env.queue_api.stats().unwrap().pending_count, 0);
}
