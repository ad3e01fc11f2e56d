use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params_from_iter};
use uuid::Uuid;

use mentorlink_types::api::LeaderboardFilter;
use mentorlink_types::models::Role;

use crate::Database;
use crate::models::{MAX_POINT_BALANCE, NewUser, PointsAward, UserRow};
use crate::repo::UserRepository;
use crate::sql;

const USER_COLUMNS: &str = "id, name, email, password, role, school, grade, mentor_id, \
                            academic_points, athletic_points, created_at";

impl UserRepository for Database {
    fn create_user(&self, user: &NewUser) -> Result<Option<UserRow>> {
        let row = UserRow {
            id: Uuid::new_v4(),
            name: user.name.clone(),
            email: normalize_email(&user.email),
            password: user.password_hash.clone(),
            role: user.role,
            school: user.school.clone(),
            grade: user.grade.clone(),
            mentor_id: None,
            academic_points: 0,
            athletic_points: 0,
            created_at: sql::now(),
        };

        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, name, email, password, role, school, grade, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(email) DO NOTHING",
                rusqlite::params![
                    row.id.to_string(),
                    &row.name,
                    &row.email,
                    &row.password,
                    row.role.as_str(),
                    &row.school,
                    &row.grade,
                    sql::fmt_ts(row.created_at),
                ],
            )?;
            Ok((inserted == 1).then_some(row))
        })
    }

    fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        let email = normalize_email(email);
        self.with_conn(|conn| {
            let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1");
            Ok(conn.query_row(&query, [email], map_user).optional()?)
        })
    }

    fn users_by_ids(&self, ids: &[Uuid]) -> Result<Vec<UserRow>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let query = format!(
                "SELECT {USER_COLUMNS} FROM users WHERE id IN ({})",
                sql::placeholders(1, ids.len())
            );
            let mut stmt = conn.prepare(&query)?;
            let rows = stmt
                .query_map(params_from_iter(ids.iter().map(Uuid::to_string)), map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn users_except(&self, id: Uuid) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id != ?1 ORDER BY name, id");
            let mut stmt = conn.prepare(&query)?;
            let rows = stmt
                .query_map([id.to_string()], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn students(&self, unmentored_only: bool) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let filter = if unmentored_only { " AND mentor_id IS NULL" } else { "" };
            let query = format!(
                "SELECT {USER_COLUMNS} FROM users WHERE role = 'STUDENT'{filter} ORDER BY name, id"
            );
            let mut stmt = conn.prepare(&query)?;
            let rows = stmt
                .query_map([], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn assign_mentor(&self, student_id: Uuid, mentor_id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE users SET mentor_id = ?2 WHERE id = ?1 AND role = 'STUDENT'",
                [student_id.to_string(), mentor_id.to_string()],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            query_user_by_id(conn, student_id)
        })
    }

    fn award_points(&self, student_id: Uuid, academic: i64, athletic: i64) -> Result<Option<PointsAward>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let Some(student) = query_user_by_id(&tx, student_id)?.filter(|u| u.role == Role::Student) else {
                return Ok(None);
            };

            let balances = student
                .academic_points
                .checked_add(academic)
                .zip(student.athletic_points.checked_add(athletic))
                .filter(|(a, b)| {
                    let range = 0..=MAX_POINT_BALANCE;
                    range.contains(a) && range.contains(b)
                });
            let Some((academic_points, athletic_points)) = balances else {
                return Ok(Some(PointsAward::OutOfRange));
            };

            tx.execute(
                "UPDATE users SET academic_points = ?2, athletic_points = ?3 WHERE id = ?1",
                rusqlite::params![student_id.to_string(), academic_points, athletic_points],
            )?;
            tx.commit()?;

            Ok(Some(PointsAward::Awarded(UserRow {
                academic_points,
                athletic_points,
                ..student
            })))
        })
    }

    fn leaderboard(&self, filter: LeaderboardFilter) -> Result<Vec<UserRow>> {
        let order = match filter {
            LeaderboardFilter::Total => "academic_points + athletic_points",
            LeaderboardFilter::Academic => "academic_points",
            LeaderboardFilter::Athletic => "athletic_points",
        };

        self.with_conn(|conn| {
            let query = format!(
                "SELECT {USER_COLUMNS} FROM users WHERE role = 'STUDENT' ORDER BY {order} DESC, name, id"
            );
            let mut stmt = conn.prepare(&query)?;
            let rows = stmt
                .query_map([], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn query_user_by_id(conn: &Connection, id: Uuid) -> Result<Option<UserRow>> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    Ok(conn.query_row(&query, [id.to_string()], map_user).optional()?)
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: sql::uuid(row, 0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        role: sql::role(row, 4)?,
        school: row.get(5)?,
        grade: row.get(6)?,
        mentor_id: sql::opt_uuid(row, 7)?,
        academic_points: row.get(8)?,
        athletic_points: row.get(9)?,
        created_at: sql::ts(row, 10)?,
    })
}
