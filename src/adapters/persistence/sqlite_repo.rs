//! SQLite-backed repository via libsql. Implements all four store ports.
//!
//! One database file (fairshare.db) in the given base directory. Group
//! membership lives in a join table with a composite primary key; expense
//! splits are stored as a JSON column. Messages are indexed by
//! (group_id, created_at) for ascending history reads.

use crate::domain::{
    DomainError, Expense, ExpenseId, Group, GroupId, Member, MemberId, Message, Split,
};
use crate::ports::{ExpenseStore, GroupStore, MessageStore, UserDirectory};
use chrono::Utc;
use libsql::{params, Connection, Database};
use std::path::{Path, PathBuf};
use tracing::info;

const MEMBERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS members (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE
)"#;

const GROUPS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS groups (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    owner INTEGER NOT NULL
)"#;

/// Membership join table. Row order (rowid) preserves insertion order, which
/// settlement relies on for a stable debtor/creditor partition.
const GROUP_MEMBERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS group_members (
    group_id INTEGER NOT NULL,
    member_id INTEGER NOT NULL,
    PRIMARY KEY (group_id, member_id)
)"#;

const EXPENSES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS expenses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    group_id INTEGER NOT NULL,
    title TEXT NOT NULL DEFAULT '',
    amount REAL NOT NULL,
    paid_by INTEGER NOT NULL,
    splits_json TEXT NOT NULL,
    date INTEGER NOT NULL,
    created_at INTEGER NOT NULL
)"#;
const EXPENSES_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_expenses_group ON expenses (group_id, id)";

const MESSAGES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    group_id INTEGER NOT NULL,
    sender INTEGER NOT NULL,
    content TEXT NOT NULL,
    created_at INTEGER NOT NULL
)"#;
const MESSAGES_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_messages_group_created ON messages (group_id, created_at ASC)";

/// SQLite repository. One database file (fairshare.db) in the base directory.
pub struct SqliteRepo {
    db: Database,
    db_path: PathBuf,
}

impl SqliteRepo {
    /// Connect to (or create) the database and ensure the schema exists.
    /// Call once at startup; the returned repo is safe to share via Arc.
    ///
    /// Sets WAL mode and synchronous=NORMAL for concurrent read/write without
    /// sacrificing durability.
    pub async fn connect(base_dir: impl AsRef<Path>) -> Result<Self, DomainError> {
        let base = base_dir.as_ref();
        std::fs::create_dir_all(base).map_err(|e| DomainError::Repo(e.to_string()))?;
        let db_path = base.join("fairshare.db");
        let path_str = db_path.to_string_lossy();
        let db = libsql::Builder::new_local(path_str.as_ref())
            .build()
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        let conn = db.connect().map_err(|e| DomainError::Repo(e.to_string()))?;

        // PRAGMA returns a row (new value); use query and consume rows
        // (execute fails when rows are returned).
        for pragma in ["PRAGMA journal_mode=WAL", "PRAGMA synchronous=NORMAL"] {
            let mut rows = conn
                .query(pragma, ())
                .await
                .map_err(|e| DomainError::Repo(format!("{} failed: {}", pragma, e)))?;
            while rows
                .next()
                .await
                .map_err(|e| DomainError::Repo(e.to_string()))?
                .is_some()
            {}
        }

        for ddl in [
            MEMBERS_TABLE,
            GROUPS_TABLE,
            GROUP_MEMBERS_TABLE,
            EXPENSES_TABLE,
            EXPENSES_INDEX,
            MESSAGES_TABLE,
            MESSAGES_INDEX,
        ] {
            conn.execute(ddl, ())
                .await
                .map_err(|e| DomainError::Repo(e.to_string()))?;
        }

        info!(path = %db_path.display(), "SQLite connected with WAL mode");

        Ok(Self {
            db,
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn conn(&self) -> Result<Connection, DomainError> {
        self.db.connect().map_err(|e| DomainError::Repo(e.to_string()))
    }

    fn splits_to_json(splits: &[Split]) -> Result<String, DomainError> {
        serde_json::to_string(splits).map_err(|e| DomainError::Repo(e.to_string()))
    }

    fn json_to_splits(s: &str) -> Vec<Split> {
        serde_json::from_str(s).unwrap_or_default()
    }

    /// Members of a group, insertion order (rowid of the join table).
    async fn member_ids(
        &self,
        conn: &Connection,
        group_id: GroupId,
    ) -> Result<Vec<MemberId>, DomainError> {
        let mut rows = conn
            .query(
                "SELECT member_id FROM group_members WHERE group_id = ?1 ORDER BY rowid",
                params![group_id],
            )
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        let mut ids = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?
        {
            let id: i64 = row.get(0).map_err(|e| DomainError::Repo(e.to_string()))?;
            ids.push(id);
        }
        Ok(ids)
    }

    async fn last_insert_id(&self, conn: &Connection) -> Result<i64, DomainError> {
        let mut rows = conn
            .query("SELECT last_insert_rowid()", ())
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        let row = rows
            .next()
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?
            .ok_or_else(|| DomainError::Repo("last_insert_rowid returned no row".to_string()))?;
        row.get(0).map_err(|e| DomainError::Repo(e.to_string()))
    }
}

#[async_trait::async_trait]
impl GroupStore for SqliteRepo {
    async fn create_group(&self, name: &str, owner: MemberId) -> Result<Group, DomainError> {
        let conn = self.conn()?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        tx.execute(
            "INSERT INTO groups (name, owner) VALUES (?1, ?2)",
            params![name, owner],
        )
        .await
        .map_err(|e| DomainError::Repo(e.to_string()))?;
        let mut rows = tx
            .query("SELECT last_insert_rowid()", ())
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        let group_id: i64 = rows
            .next()
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?
            .ok_or_else(|| DomainError::Repo("last_insert_rowid returned no row".to_string()))?
            .get(0)
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        tx.execute(
            "INSERT INTO group_members (group_id, member_id) VALUES (?1, ?2)",
            params![group_id, owner],
        )
        .await
        .map_err(|e| DomainError::Repo(e.to_string()))?;
        tx.commit()
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;

        Ok(Group {
            id: group_id,
            name: name.to_string(),
            owner,
            members: vec![owner],
        })
    }

    async fn get_group(&self, group_id: GroupId) -> Result<Group, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                "SELECT id, name, owner FROM groups WHERE id = ?1",
                params![group_id],
            )
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        let row = rows
            .next()
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?
            .ok_or_else(|| DomainError::NotFound(format!("group {}", group_id)))?;

        let id: i64 = row.get(0).map_err(|e| DomainError::Repo(e.to_string()))?;
        let name: String = row.get(1).map_err(|e| DomainError::Repo(e.to_string()))?;
        let owner: i64 = row.get(2).map_err(|e| DomainError::Repo(e.to_string()))?;
        let members = self.member_ids(&conn, group_id).await?;

        Ok(Group {
            id,
            name,
            owner,
            members,
        })
    }

    async fn groups_for_member(&self, member: MemberId) -> Result<Vec<Group>, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                r#"
                SELECT g.id, g.name, g.owner
                FROM groups g
                JOIN group_members gm ON gm.group_id = g.id
                WHERE gm.member_id = ?1
                ORDER BY g.id
                "#,
                params![member],
            )
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;

        let mut headers = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?
        {
            let id: i64 = row.get(0).map_err(|e| DomainError::Repo(e.to_string()))?;
            let name: String = row.get(1).map_err(|e| DomainError::Repo(e.to_string()))?;
            let owner: i64 = row.get(2).map_err(|e| DomainError::Repo(e.to_string()))?;
            headers.push((id, name, owner));
        }

        let mut groups = Vec::with_capacity(headers.len());
        for (id, name, owner) in headers {
            let members = self.member_ids(&conn, id).await?;
            groups.push(Group {
                id,
                name,
                owner,
                members,
            });
        }
        Ok(groups)
    }

    async fn add_member(&self, group_id: GroupId, member: MemberId) -> Result<Group, DomainError> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO group_members (group_id, member_id)
            VALUES (?1, ?2)
            ON CONFLICT (group_id, member_id) DO NOTHING
            "#,
            params![group_id, member],
        )
        .await
        .map_err(|e| DomainError::Repo(e.to_string()))?;
        self.get_group(group_id).await
    }

    async fn delete_group(&self, group_id: GroupId) -> Result<(), DomainError> {
        let conn = self.conn()?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        tx.execute(
            "DELETE FROM group_members WHERE group_id = ?1",
            params![group_id],
        )
        .await
        .map_err(|e| DomainError::Repo(e.to_string()))?;
        tx.execute("DELETE FROM groups WHERE id = ?1", params![group_id])
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        tx.commit()
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ExpenseStore for SqliteRepo {
    async fn add_expense(
        &self,
        group_id: GroupId,
        title: &str,
        amount: f64,
        paid_by: MemberId,
        splits: &[Split],
        date: i64,
    ) -> Result<Expense, DomainError> {
        let conn = self.conn()?;
        let splits_json = Self::splits_to_json(splits)?;
        let created_at = Utc::now().timestamp_millis();
        conn.execute(
            r#"
            INSERT INTO expenses (group_id, title, amount, paid_by, splits_json, date, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![group_id, title, amount, paid_by, splits_json.as_str(), date, created_at],
        )
        .await
        .map_err(|e| DomainError::Repo(e.to_string()))?;
        let id = self.last_insert_id(&conn).await?;

        Ok(Expense {
            id,
            group_id,
            title: title.to_string(),
            amount,
            paid_by,
            splits: splits.to_vec(),
            date,
            created_at,
        })
    }

    async fn list_expenses(&self, group_id: GroupId) -> Result<Vec<Expense>, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                r#"
                SELECT id, group_id, title, amount, paid_by, splits_json, date, created_at
                FROM expenses
                WHERE group_id = ?1
                ORDER BY id
                "#,
                params![group_id],
            )
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;

        let mut expenses = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?
        {
            expenses.push(Self::row_to_expense(&row)?);
        }
        Ok(expenses)
    }

    async fn get_expense(&self, expense_id: ExpenseId) -> Result<Expense, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                r#"
                SELECT id, group_id, title, amount, paid_by, splits_json, date, created_at
                FROM expenses
                WHERE id = ?1
                "#,
                params![expense_id],
            )
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        let row = rows
            .next()
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?
            .ok_or_else(|| DomainError::NotFound(format!("expense {}", expense_id)))?;
        Self::row_to_expense(&row)
    }

    async fn delete_expense(&self, expense_id: ExpenseId) -> Result<(), DomainError> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM expenses WHERE id = ?1", params![expense_id])
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        Ok(())
    }

    async fn delete_group_expenses(&self, group_id: GroupId) -> Result<(), DomainError> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM expenses WHERE group_id = ?1",
            params![group_id],
        )
        .await
        .map_err(|e| DomainError::Repo(e.to_string()))?;
        Ok(())
    }
}

impl SqliteRepo {
    fn row_to_expense(row: &libsql::Row) -> Result<Expense, DomainError> {
        let id: i64 = row.get(0).map_err(|e| DomainError::Repo(e.to_string()))?;
        let group_id: i64 = row.get(1).map_err(|e| DomainError::Repo(e.to_string()))?;
        let title: String = row.get::<String>(2).unwrap_or_default();
        let amount: f64 = row.get(3).map_err(|e| DomainError::Repo(e.to_string()))?;
        let paid_by: i64 = row.get(4).map_err(|e| DomainError::Repo(e.to_string()))?;
        let splits_json: String = row.get::<String>(5).unwrap_or_default();
        let date: i64 = row.get(6).map_err(|e| DomainError::Repo(e.to_string()))?;
        let created_at: i64 = row.get(7).map_err(|e| DomainError::Repo(e.to_string()))?;
        Ok(Expense {
            id,
            group_id,
            title,
            amount,
            paid_by,
            splits: Self::json_to_splits(&splits_json),
            date,
            created_at,
        })
    }
}

#[async_trait::async_trait]
impl MessageStore for SqliteRepo {
    async fn save_message(
        &self,
        group_id: GroupId,
        sender: MemberId,
        content: &str,
    ) -> Result<Message, DomainError> {
        let conn = self.conn()?;
        let created_at = Utc::now().timestamp_millis();
        conn.execute(
            r#"
            INSERT INTO messages (group_id, sender, content, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![group_id, sender, content, created_at],
        )
        .await
        .map_err(|e| DomainError::Repo(e.to_string()))?;
        let id = self.last_insert_id(&conn).await?;

        // Resolve the sender name here so the router broadcasts a populated
        // message. A missing directory row falls back to the raw id.
        let sender_name = match self.get_member(sender).await {
            Ok(m) => m.name,
            Err(DomainError::NotFound(_)) => sender.to_string(),
            Err(e) => return Err(e),
        };

        Ok(Message {
            id,
            group_id,
            sender,
            sender_name,
            content: content.to_string(),
            created_at,
        })
    }

    async fn list_messages(&self, group_id: GroupId) -> Result<Vec<Message>, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                r#"
                SELECT m.id, m.group_id, m.sender, mem.name, m.content, m.created_at
                FROM messages m
                LEFT JOIN members mem ON mem.id = m.sender
                WHERE m.group_id = ?1
                ORDER BY m.created_at ASC, m.id ASC
                "#,
                params![group_id],
            )
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;

        let mut messages = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?
        {
            let id: i64 = row.get(0).map_err(|e| DomainError::Repo(e.to_string()))?;
            let group_id: i64 = row.get(1).map_err(|e| DomainError::Repo(e.to_string()))?;
            let sender: i64 = row.get(2).map_err(|e| DomainError::Repo(e.to_string()))?;
            let sender_name: String = row
                .get::<String>(3)
                .unwrap_or_else(|_| sender.to_string());
            let content: String = row.get::<String>(4).unwrap_or_default();
            let created_at: i64 = row.get(5).map_err(|e| DomainError::Repo(e.to_string()))?;
            messages.push(Message {
                id,
                group_id,
                sender,
                sender_name,
                content,
                created_at,
            });
        }
        Ok(messages)
    }

    async fn delete_group_messages(&self, group_id: GroupId) -> Result<(), DomainError> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM messages WHERE group_id = ?1",
            params![group_id],
        )
        .await
        .map_err(|e| DomainError::Repo(e.to_string()))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl UserDirectory for SqliteRepo {
    async fn get_member(&self, member: MemberId) -> Result<Member, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                "SELECT id, name, email FROM members WHERE id = ?1",
                params![member],
            )
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        let row = rows
            .next()
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?
            .ok_or_else(|| DomainError::NotFound(format!("member {}", member)))?;
        Self::row_to_member(&row)
    }

    async fn find_by_email(&self, email: &str) -> Result<Member, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                "SELECT id, name, email FROM members WHERE email = ?1 COLLATE NOCASE",
                params![email],
            )
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        let row = rows
            .next()
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?
            .ok_or_else(|| DomainError::NotFound(format!("no user with email {}", email)))?;
        Self::row_to_member(&row)
    }
}

impl SqliteRepo {
    fn row_to_member(row: &libsql::Row) -> Result<Member, DomainError> {
        let id: i64 = row.get(0).map_err(|e| DomainError::Repo(e.to_string()))?;
        let name: String = row.get(1).map_err(|e| DomainError::Repo(e.to_string()))?;
        let email: String = row.get(2).map_err(|e| DomainError::Repo(e.to_string()))?;
        Ok(Member { id, name, email })
    }

    /// Insert a directory entry. Member records are owned by the
    /// user-management collaborator in production; the demo binary seeds
    /// them through this. Idempotent on email so reruns against the same
    /// database file keep their ids.
    pub async fn seed_member(&self, name: &str, email: &str) -> Result<MemberId, DomainError> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO members (name, email)
            VALUES (?1, ?2)
            ON CONFLICT (email) DO NOTHING
            "#,
            params![name, email],
        )
        .await
        .map_err(|e| DomainError::Repo(e.to_string()))?;
        Ok(self.find_by_email(email).await?.id)
    }
}
