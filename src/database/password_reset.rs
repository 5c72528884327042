use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::password_reset::PasswordReset;
use chrono::{DateTime, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Generate a reset token. Returns (plain_token, token_hash); only the hash is stored.
pub fn generate_reset_token() -> (String, String) {
    let token_bytes: [u8; 32] = rand::rng().random();
    let token = hex::encode(token_bytes);
    let token_hash = hash_reset_token(&token);

    (token, token_hash)
}

pub fn hash_reset_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

impl PostgresRepository {
    /// Replaces any outstanding token for the user with a fresh one.
    pub async fn create_password_reset(&self, user_id: &Uuid, token_hash: &str, expires_at: DateTime<Utc>) -> Result<PasswordReset, AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM password_resets WHERE user_id = $1 AND used_at IS NULL")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let reset = sqlx::query_as::<_, PasswordReset>(
            r#"
            INSERT INTO password_resets (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, expires_at, used_at
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(reset)
    }

    pub async fn get_password_reset_by_token(&self, token_hash: &str) -> Result<Option<PasswordReset>, AppError> {
        let reset = sqlx::query_as::<_, PasswordReset>(
            r#"
            SELECT id, user_id, expires_at, used_at
            FROM password_resets
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(reset)
    }

    /// Consumes the token and stores the new hash in one transaction.
    /// Returns false, changing nothing, when the token was already consumed.
    pub async fn complete_password_reset(&self, reset_id: &Uuid, user_id: &Uuid, password_hash: &str) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let consumed = sqlx::query(
            r#"
            UPDATE password_resets
            SET used_at = now()
            WHERE id = $1 AND user_id = $2 AND used_at IS NULL
            "#,
        )
        .bind(reset_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if consumed.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(false);
        }

        let updated = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $1, password_changed_at = now()
            WHERE id = $2
            "#,
        )
        .bind(password_hash)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(AppError::UserNotFound);
        }

        tx.commit().await?;

        Ok(true)
    }

    pub async fn delete_expired_password_resets(&self) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            DELETE FROM password_resets
            WHERE expires_at < now()
               OR used_at IS NOT NULL
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_reset_token() {
        let (token, token_hash) = generate_reset_token();

        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(token_hash.len(), 64);
        assert_ne!(token, token_hash);
        assert_eq!(token_hash, hash_reset_token(&token));
    }

    #[test]
    fn test_generate_reset_token_unique() {
        let (token1, hash1) = generate_reset_token();
        let (token2, hash2) = generate_reset_token();

        assert_ne!(token1, token2);
        assert_ne!(hash1, hash2);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn test_reset_token_changes_the_password_once() {
        use crate::database::user::{UserLookupRepository, hash_password};
        use crate::models::user::UserRole;

        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL");
        let pool = sqlx::PgPool::connect(&url).await.unwrap();
        crate::db::run_migrations(&pool).await.unwrap();
        let repo = PostgresRepository { pool };

        let email = format!("reset-{}@example.com", Uuid::new_v4());
        let user = repo
            .create_user("Reset", &email, &hash_password("Reservoir#2026").unwrap(), UserRole::Cashier)
            .await
            .unwrap();
        let (_, token_hash) = generate_reset_token();
        let reset = repo
            .create_password_reset(&user.id, &token_hash, Utc::now() + chrono::Duration::minutes(30))
            .await
            .unwrap();

        assert!(repo.complete_password_reset(&reset.id, &user.id, "$argon2id$first").await.unwrap());
        assert!(!repo.complete_password_reset(&reset.id, &user.id, "$argon2id$second").await.unwrap());

        let stored = repo.get_user_by_email(&email).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "$argon2id$first");
        assert!(repo.get_password_reset_by_token(&token_hash).await.unwrap().unwrap().used_at.is_some());
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn test_reset_for_missing_user_leaves_token_unused() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL");
        let pool = sqlx::PgPool::connect(&url).await.unwrap();
        crate::db::run_migrations(&pool).await.unwrap();
        let repo = PostgresRepository { pool };

        let consumed = repo.complete_password_reset(&Uuid::new_v4(), &Uuid::new_v4(), "$argon2id$x").await.unwrap();
        assert!(!consumed);
    }
}
