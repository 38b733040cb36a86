use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Rooms of the demo building, as the seed SQL writes them.
const SEED_ROOMS: &[SeedRoom] = &[
    SeedRoom { id: "room-aquarium", name: "Aquarium", capacity: 6, equipment: &["écran", "wifi"] },
    SeedRoom {
        id: "room-jupiter",
        name: "Jupiter",
        capacity: 10,
        equipment: &["vidéo-projecteur", "tableau blanc", "wifi"],
    },
    SeedRoom {
        id: "room-everest",
        name: "Everest",
        capacity: 20,
        equipment: &["projecteur HD", "visioconférence", "micro", "wifi"],
    },
    SeedRoom {
        id: "room-studio",
        name: "Studio",
        capacity: 4,
        equipment: &["écran", "caméra", "visioconférence"],
    },
    SeedRoom { id: "room-agora", name: "Agora", capacity: 12, equipment: &["tableau blanc", "écran", "wifi"] },
    SeedRoom { id: "room-cabine", name: "Cabine", capacity: 2, equipment: &["téléphone"] },
];

const SEED_USERS: &[SeedUser] = &[
    SeedUser { id: "user-alice", organization: Some("Acme") },
    SeedUser { id: "user-bruno", organization: Some("Acme") },
    SeedUser { id: "user-chloe", organization: Some("Acme") },
    SeedUser { id: "user-david", organization: Some("Acme") },
    SeedUser { id: "user-emma", organization: Some("Globex") },
    SeedUser { id: "user-farid", organization: Some("Globex") },
    SeedUser { id: "user-guest", organization: None },
];

/// Deterministic demo inventory: six rooms and a two-organisation directory.
pub struct DemoDataset;

impl DemoDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed_data.sql");

    /// Applies the seed SQL. Existing rows are left untouched, so loading twice is harmless.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            rooms_seeded: SEED_ROOMS.iter().map(|room| room.id).collect(),
            users_seeded: SEED_USERS.iter().map(|user| user.id).collect(),
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for room in SEED_ROOMS {
            let row = sqlx::query_as::<_, (String, i64, String, i64)>(
                "SELECT name, capacity, equipment_json, active FROM room WHERE id = ?1",
            )
            .bind(room.id)
            .fetch_optional(pool)
            .await?;

            let matches = match row {
                Some((name, capacity, equipment_json, active)) => {
                    let equipment: Vec<String> = serde_json::from_str(&equipment_json)
                        .map_err(|error| RepositoryError::Decode(error.to_string()))?;
                    name == room.name
                        && capacity == room.capacity
                        && active == 1
                        && string_list_matches(&equipment, room.equipment)
                }
                None => false,
            };
            checks.push((room.id, matches));
        }

        for user in SEED_USERS {
            let organization: Option<Option<String>> =
                sqlx::query_scalar("SELECT organization FROM app_user WHERE id = ?1")
                    .bind(user.id)
                    .fetch_optional(pool)
                    .await?;
            let matches = organization
                .map(|stored| stored.as_deref() == user.organization)
                .unwrap_or(false);
            checks.push((user.id, matches));
        }

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes the seeded rows together with any meeting booked in the seeded rooms.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let room_ids = sql_array_from_ids(&SEED_ROOMS.iter().map(|room| room.id).collect::<Vec<_>>());
        let user_ids = sql_array_from_ids(&SEED_USERS.iter().map(|user| user.id).collect::<Vec<_>>());

        let mut tx = pool.begin().await?;
        sqlx::query(&format!("DELETE FROM meeting WHERE room_id IN {room_ids}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM room WHERE id IN {room_ids}")).execute(&mut *tx).await?;
        sqlx::query(&format!("DELETE FROM app_user WHERE id IN {user_ids}"))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedRoom {
    id: &'static str,
    name: &'static str,
    capacity: i64,
    equipment: &'static [&'static str],
}

#[derive(Debug, Clone, Copy)]
struct SeedUser {
    id: &'static str,
    organization: Option<&'static str>,
}

fn string_list_matches(actual: &[String], expected: &[&str]) -> bool {
    actual.len() == expected.len() && actual.iter().zip(expected).all(|(a, b)| a == b)
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{}'", id)).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug)]
pub struct SeedResult {
    pub rooms_seeded: Vec<&'static str>,
    pub users_seeded: Vec<&'static str>,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

#[cfg(test)]
mod tests {
    use roomwise_core::store::{Directory, RoomInventory};

    use super::*;
    use crate::repositories::{SqlDirectory, SqlRoomInventory};
    use crate::{connect_with_settings, migrations};

    async fn migrated_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect to test database");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    #[test]
    fn sql_fixture_is_valid() {
        assert!(!DemoDataset::SQL.is_empty());
        for room in SEED_ROOMS {
            assert!(DemoDataset::SQL.contains(room.id), "seed SQL misses {}", room.id);
        }
    }

    #[tokio::test]
    async fn load_is_idempotent_and_verifies() {
        let pool = migrated_pool().await;

        let first = DemoDataset::load(&pool).await.expect("load seed fixtures");
        let first_verification = DemoDataset::verify(&pool).await.expect("verify seed fixtures");
        assert!(first_verification.all_present, "{:?}", first_verification.checks);
        assert_eq!(first.rooms_seeded.len(), 6);

        DemoDataset::load(&pool).await.expect("reload seed fixtures");
        let second_verification = DemoDataset::verify(&pool).await.expect("re-verify seed fixtures");
        assert_eq!(first_verification.checks, second_verification.checks);

        let rooms = SqlRoomInventory::new(pool.clone()).list_rooms().await.expect("list rooms");
        assert_eq!(rooms.len(), 6);
    }

    #[tokio::test]
    async fn seeded_directory_groups_members_by_organization() {
        let pool = migrated_pool().await;
        DemoDataset::load(&pool).await.expect("load seed fixtures");

        let directory = SqlDirectory::new(pool);
        assert_eq!(directory.members_of("acme").await.expect("members").len(), 4);
        assert_eq!(directory.members_of("Globex").await.expect("members").len(), 2);
    }

    #[tokio::test]
    async fn clean_removes_seeded_rows() {
        let pool = migrated_pool().await;
        DemoDataset::load(&pool).await.expect("load seed fixtures");
        DemoDataset::clean(&pool).await.expect("clean seed fixtures");

        let verification = DemoDataset::verify(&pool).await.expect("verify after clean");
        assert!(!verification.all_present);
        assert!(verification.checks.iter().all(|(_, present)| !present));
    }
}
