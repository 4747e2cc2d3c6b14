use crate::Database;
use crate::models::{FileRow, TokenRow, UserRow};
use anyhow::{Result, anyhow};
use rusqlite::{Connection, OptionalExtension};

impl Database {
    // -- Users --

    pub fn create_user(&self, email: &str, password_hash: &str) -> Result<UserRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (email, password) VALUES (?1, ?2)",
                (email, password_hash),
            )?;
            let id = conn.last_insert_rowid();
            query_user_by_id(conn, id)?.ok_or_else(|| anyhow!("user {id} vanished after insert"))
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{USER_SELECT} WHERE email = ?1"))?;
            let row = stmt.query_row([email], map_user_row).optional()?;
            Ok(row)
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    pub fn set_user_plan(&self, id: i64, plan: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("UPDATE users SET plan = ?1 WHERE id = ?2", (plan, id))?;
            Ok(changed > 0)
        })
    }

    /// Deactivated accounts keep their rows but fail both auth paths.
    pub fn set_user_active(&self, id: i64, active: bool) -> Result<bool> {
        self.with_conn(|conn| {
            let changed =
                conn.execute("UPDATE users SET active = ?1 WHERE id = ?2", (active, id))?;
            Ok(changed > 0)
        })
    }

    // -- Tokens --

    pub fn insert_token(
        &self,
        id: &str,
        user_id: i64,
        name: &str,
        secret: &str,
        permissions: &str,
    ) -> Result<TokenRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tokens (id, user_id, name, secret, permissions)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, user_id, name, secret, permissions),
            )?;
            query_token(conn, user_id, id)?
                .ok_or_else(|| anyhow!("token {id} vanished after insert"))
        })
    }

    /// Every token lookup is scoped to its owner: a cross-user id resolves as
    /// absent, never as a distinguishable "forbidden".
    pub fn get_token(&self, user_id: i64, id: &str) -> Result<Option<TokenRow>> {
        self.with_conn(|conn| query_token(conn, user_id, id))
    }

    pub fn list_tokens(&self, user_id: i64) -> Result<Vec<TokenRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{TOKEN_SELECT} WHERE user_id = ?1 ORDER BY created_at, id"
            ))?;
            let rows = stmt
                .query_map([user_id], map_token_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Overwrite the stored secret in place. The old secret is invalid as
    /// soon as the update commits; identity, name, permissions and
    /// created_at are untouched.
    pub fn reset_token_secret(
        &self,
        user_id: i64,
        id: &str,
        new_secret: &str,
    ) -> Result<Option<TokenRow>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE tokens SET secret = ?1 WHERE id = ?2 AND user_id = ?3",
                (new_secret, id, user_id),
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_token(conn, user_id, id)
        })
    }

    pub fn delete_token(&self, user_id: i64, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM tokens WHERE id = ?1 AND user_id = ?2",
                (id, user_id),
            )?;
            Ok(deleted > 0)
        })
    }

    /// Single lookup for the basic-auth token path: the secret must match a
    /// token owned by the user with that email.
    pub fn find_token_for_auth(
        &self,
        email: &str,
        secret: &str,
    ) -> Result<Option<(TokenRow, UserRow)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT t.id, t.user_id, t.name, t.secret, t.permissions, t.created_at, t.last_used,
                        u.id, u.email, u.password, u.active, u.plan, u.created_at, u.updated_at
                 FROM tokens t
                 JOIN users u ON t.user_id = u.id
                 WHERE t.secret = ?1 AND u.email = ?2",
            )?;
            let row = stmt
                .query_row((secret, email), |row| {
                    Ok((
                        TokenRow {
                            id: row.get(0)?,
                            user_id: row.get(1)?,
                            name: row.get(2)?,
                            secret: row.get(3)?,
                            permissions: row.get(4)?,
                            created_at: row.get(5)?,
                            last_used: row.get(6)?,
                        },
                        UserRow {
                            id: row.get(7)?,
                            email: row.get(8)?,
                            password: row.get(9)?,
                            active: row.get(10)?,
                            plan: row.get(11)?,
                            created_at: row.get(12)?,
                            updated_at: row.get(13)?,
                        },
                    ))
                })
                .optional()?;
            Ok(row)
        })
    }

    pub fn touch_token_last_used(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE tokens SET last_used = datetime('now') WHERE id = ?1",
                [id],
            )?;
            Ok(())
        })
    }

    // -- Files --

    pub fn insert_file(
        &self,
        id: &str,
        user_id: i64,
        hash: &str,
        size: i64,
        metadata: &str,
    ) -> Result<FileRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO files (id, user_id, hash, size, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, user_id, hash, size, metadata),
            )?;
            query_file(conn, user_id, id)?.ok_or_else(|| anyhow!("file {id} vanished after insert"))
        })
    }

    pub fn get_file(&self, user_id: i64, id: &str) -> Result<Option<FileRow>> {
        self.with_conn(|conn| query_file(conn, user_id, id))
    }

    pub fn list_files(&self, user_id: i64) -> Result<Vec<FileRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{FILE_SELECT} WHERE user_id = ?1 ORDER BY pinned_at, id"
            ))?;
            let rows = stmt
                .query_map([user_id], map_file_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_files_by_hash(&self, hash: &str) -> Result<Vec<FileRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{FILE_SELECT} WHERE hash = ?1 ORDER BY pinned_at, id"
            ))?;
            let rows = stmt
                .query_map([hash], map_file_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// End retention for a file: from here on an external reaper may collect
    /// the underlying blob once no pinned record references it. The first
    /// unpin wins; repeating it resolves as absent so the recorded
    /// retention-end timestamp never moves.
    pub fn unpin_file(&self, user_id: i64, id: &str) -> Result<Option<FileRow>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE files SET unpinned_at = datetime('now')
                 WHERE id = ?1 AND user_id = ?2 AND unpinned_at IS NULL",
                (id, user_id),
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_file(conn, user_id, id)
        })
    }
}

const USER_SELECT: &str =
    "SELECT id, email, password, active, plan, created_at, updated_at FROM users";

const TOKEN_SELECT: &str =
    "SELECT id, user_id, name, secret, permissions, created_at, last_used FROM tokens";

const FILE_SELECT: &str =
    "SELECT id, user_id, hash, size, pinned_at, unpinned_at, metadata FROM files";

fn map_user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password: row.get(2)?,
        active: row.get(3)?,
        plan: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn map_token_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TokenRow> {
    Ok(TokenRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        secret: row.get(3)?,
        permissions: row.get(4)?,
        created_at: row.get(5)?,
        last_used: row.get(6)?,
    })
}

fn map_file_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileRow> {
    Ok(FileRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        hash: row.get(2)?,
        size: row.get(3)?,
        pinned_at: row.get(4)?,
        unpinned_at: row.get(5)?,
        metadata: row.get(6)?,
    })
}

fn query_user_by_id(conn: &Connection, id: i64) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("{USER_SELECT} WHERE id = ?1"))?;
    let row = stmt.query_row([id], map_user_row).optional()?;
    Ok(row)
}

fn query_token(conn: &Connection, user_id: i64, id: &str) -> Result<Option<TokenRow>> {
    let mut stmt = conn.prepare(&format!("{TOKEN_SELECT} WHERE id = ?1 AND user_id = ?2"))?;
    let row = stmt.query_row((id, user_id), map_token_row).optional()?;
    Ok(row)
}

fn query_file(conn: &Connection, user_id: i64, id: &str) -> Result<Option<FileRow>> {
    let mut stmt = conn.prepare(&format!("{FILE_SELECT} WHERE id = ?1 AND user_id = ?2"))?;
    let row = stmt.query_row((id, user_id), map_file_row).optional()?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use crate::{Database, is_unique_violation};
    use uuid::Uuid;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn new_token_id() -> String {
        Uuid::new_v4().to_string()
    }

    #[test]
    fn duplicate_email_is_a_unique_violation() {
        let db = test_db();
        db.create_user("a@example.com", "digest").unwrap();

        let err = db.create_user("a@example.com", "digest2").unwrap_err();
        assert!(is_unique_violation(&err));

        // Unrelated errors are not reclassified
        let other = anyhow::anyhow!("boom");
        assert!(!is_unique_violation(&other));
    }

    #[test]
    fn users_default_to_active_free_plan() {
        let db = test_db();
        let user = db.create_user("a@example.com", "digest").unwrap();
        assert_eq!(user.id, 1);
        assert!(user.active);
        assert_eq!(user.plan, "Free");

        assert!(db.set_user_plan(user.id, "Premium").unwrap());
        let user = db.get_user_by_id(user.id).unwrap().unwrap();
        assert_eq!(user.plan, "Premium");

        assert!(db.set_user_active(user.id, false).unwrap());
        let user = db.get_user_by_id(user.id).unwrap().unwrap();
        assert!(!user.active);
    }

    #[test]
    fn token_lookups_are_scoped_to_the_owner() {
        let db = test_db();
        let alice = db.create_user("alice@example.com", "digest").unwrap();
        let bob = db.create_user("bob@example.com", "digest").unwrap();

        let id = new_token_id();
        db.insert_token(&id, alice.id, "ci", "s".repeat(40).as_str(), "ReadWrite")
            .unwrap();

        assert!(db.get_token(alice.id, &id).unwrap().is_some());
        assert!(db.get_token(bob.id, &id).unwrap().is_none());
        assert_eq!(db.list_tokens(alice.id).unwrap().len(), 1);
        assert!(db.list_tokens(bob.id).unwrap().is_empty());

        // Cross-user reset and delete also miss
        assert!(
            db.reset_token_secret(bob.id, &id, &"x".repeat(40))
                .unwrap()
                .is_none()
        );
        assert!(!db.delete_token(bob.id, &id).unwrap());
    }

    #[test]
    fn reset_rotates_only_the_secret() {
        let db = test_db();
        let user = db.create_user("a@example.com", "digest").unwrap();
        let id = new_token_id();
        let before = db
            .insert_token(&id, user.id, "ci", &"a".repeat(40), "Read")
            .unwrap();

        let after = db
            .reset_token_secret(user.id, &id, &"b".repeat(40))
            .unwrap()
            .unwrap();

        assert_eq!(after.id, before.id);
        assert_eq!(after.name, before.name);
        assert_eq!(after.permissions, before.permissions);
        assert_eq!(after.created_at, before.created_at);
        assert_ne!(after.secret, before.secret);
    }

    #[test]
    fn delete_is_gone_on_second_attempt() {
        let db = test_db();
        let user = db.create_user("a@example.com", "digest").unwrap();
        let id = new_token_id();
        db.insert_token(&id, user.id, "ci", &"a".repeat(40), "ReadWrite")
            .unwrap();

        assert!(db.delete_token(user.id, &id).unwrap());
        assert!(!db.delete_token(user.id, &id).unwrap());
        assert!(db.get_token(user.id, &id).unwrap().is_none());
    }

    #[test]
    fn token_auth_requires_matching_secret_and_email() {
        let db = test_db();
        let user = db.create_user("a@example.com", "digest").unwrap();
        let id = new_token_id();
        let secret = "a".repeat(40);
        db.insert_token(&id, user.id, "ci", &secret, "ReadWrite")
            .unwrap();

        let (token, owner) = db
            .find_token_for_auth("a@example.com", &secret)
            .unwrap()
            .unwrap();
        assert_eq!(token.id, id);
        assert_eq!(owner.id, user.id);

        assert!(
            db.find_token_for_auth("a@example.com", &"b".repeat(40))
                .unwrap()
                .is_none()
        );
        assert!(
            db.find_token_for_auth("other@example.com", &secret)
                .unwrap()
                .is_none()
        );

        assert!(token.last_used.is_none());
        db.touch_token_last_used(&id).unwrap();
        let token = db.get_token(user.id, &id).unwrap().unwrap();
        assert!(token.last_used.is_some());
    }

    #[test]
    fn identical_content_keeps_per_user_file_rows() {
        let db = test_db();
        let alice = db.create_user("alice@example.com", "digest").unwrap();
        let bob = db.create_user("bob@example.com", "digest").unwrap();

        let hash = "c0ffee";
        db.insert_file(&new_token_id(), alice.id, hash, 3, "{}")
            .unwrap();
        db.insert_file(&new_token_id(), bob.id, hash, 3, "{}")
            .unwrap();

        let rows = db.list_files_by_hash(hash).unwrap();
        assert_eq!(rows.len(), 2);
        let mut owners: Vec<_> = rows.iter().map(|r| r.user_id.unwrap()).collect();
        owners.sort();
        assert_eq!(owners, vec![alice.id, bob.id]);
    }

    #[test]
    fn unpin_marks_retention_end_for_the_owner_only() {
        let db = test_db();
        let alice = db.create_user("alice@example.com", "digest").unwrap();
        let bob = db.create_user("bob@example.com", "digest").unwrap();

        let id = new_token_id();
        let file = db.insert_file(&id, alice.id, "c0ffee", 3, "{}").unwrap();
        assert!(file.unpinned_at.is_none());

        assert!(db.unpin_file(bob.id, &id).unwrap().is_none());
        let file = db.unpin_file(alice.id, &id).unwrap().unwrap();
        let first = file.unpinned_at.unwrap();

        // Repeating the unpin misses instead of moving the timestamp
        assert!(db.unpin_file(alice.id, &id).unwrap().is_none());
        let file = db.get_file(alice.id, &id).unwrap().unwrap();
        assert_eq!(file.unpinned_at.unwrap(), first);
    }

    #[test]
    fn deleting_a_user_detaches_tokens_and_files() {
        let db = test_db();
        let user = db.create_user("a@example.com", "digest").unwrap();
        let token_id = new_token_id();
        let file_id = new_token_id();
        db.insert_token(&token_id, user.id, "ci", &"a".repeat(40), "ReadWrite")
            .unwrap();
        db.insert_file(&file_id, user.id, "c0ffee", 3, "{}").unwrap();

        db.with_conn(|conn| {
            conn.execute("DELETE FROM users WHERE id = ?1", [user.id])?;
            Ok(())
        })
        .unwrap();

        // ON DELETE SET NULL: rows survive, ownership is cleared
        db.with_conn(|conn| {
            let token_owner: Option<i64> = conn.query_row(
                "SELECT user_id FROM tokens WHERE id = ?1",
                [&token_id],
                |r| r.get(0),
            )?;
            let file_owner: Option<i64> = conn.query_row(
                "SELECT user_id FROM files WHERE id = ?1",
                [&file_id],
                |r| r.get(0),
            )?;
            assert_eq!(token_owner, None);
            assert_eq!(file_owner, None);
            Ok(())
        })
        .unwrap();
    }
}
