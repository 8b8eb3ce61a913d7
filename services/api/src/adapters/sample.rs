//! services/api/src/adapters/sample.rs
//!
//! A `UserDirectory` seeded with sample users. Changes live only as long as
//! the process.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use simricare_core::domain::{UserPreferences, UserProfile, UserProfilePatch, UserRole, UserTest};
use simricare_core::ports::{PortError, PortResult, UserDirectory};
use std::collections::HashMap;
use tokio::sync::RwLock;

struct Directory {
    users: Vec<UserProfile>,
    preferences: HashMap<String, UserPreferences>,
}

pub struct SampleUserDirectory {
    inner: RwLock<Directory>,
}

fn seeded_at(days_after_launch: i64) -> DateTime<Utc> {
    // 2024-01-01T00:00:00Z
    DateTime::from_timestamp(1_704_067_200, 0).unwrap_or_default() + Duration::days(days_after_launch)
}

fn sample_user(id: &str, email: &str, name: &str, role: UserRole, day: i64) -> UserProfile {
    UserProfile {
        id: id.to_string(),
        email: email.to_string(),
        name: name.to_string(),
        phone: None,
        role,
        created_at: seeded_at(day),
    }
}

impl Default for SampleUserDirectory {
    fn default() -> Self {
        let users = vec![
            sample_user("user-1", "admin@simricare.kr", "관리자", UserRole::Admin, 0),
            sample_user("user-2", "counselor.kim@simricare.kr", "김상담", UserRole::Counselor, 3),
            sample_user("user-3", "counselor.lee@simricare.kr", "이상담", UserRole::Counselor, 7),
            sample_user("user-4", "client.park@example.com", "박내담", UserRole::User, 12),
            sample_user("user-5", "client.choi@example.com", "최내담", UserRole::User, 20),
        ];
        Self {
            inner: RwLock::new(Directory {
                users,
                preferences: HashMap::new(),
            }),
        }
    }
}

impl SampleUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

fn unknown_user(user_id: &str) -> PortError {
    PortError::NotFound(format!("User {} not found", user_id))
}

#[async_trait]
impl UserDirectory for SampleUserDirectory {
    async fn list_users(&self) -> PortResult<Vec<UserProfile>> {
        Ok(self.inner.read().await.users.clone())
    }

    async fn get_user(&self, user_id: &str) -> PortResult<UserProfile> {
        self.inner
            .read()
            .await
            .users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or_else(|| unknown_user(user_id))
    }

    async fn update_user(
        &self,
        user_id: &str,
        patch: UserProfilePatch,
    ) -> PortResult<UserProfile> {
        let mut inner = self.inner.write().await;
        let user = inner
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| unknown_user(user_id))?;
        if let Some(name) = patch.name {
            user.name = name;
        }
        if let Some(phone) = patch.phone {
            user.phone = Some(phone);
        }
        Ok(user.clone())
    }

    async fn set_role(&self, user_id: &str, role: UserRole) -> PortResult<UserProfile> {
        let mut inner = self.inner.write().await;
        let user = inner
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| unknown_user(user_id))?;
        user.role = role;
        Ok(user.clone())
    }

    async fn preferences(&self, user_id: &str) -> PortResult<UserPreferences> {
        Ok(self
            .inner
            .read()
            .await
            .preferences
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| UserPreferences::defaults_for(user_id)))
    }

    async fn save_preferences(
        &self,
        preferences: UserPreferences,
    ) -> PortResult<UserPreferences> {
        self.inner
            .write()
            .await
            .preferences
            .insert(preferences.user_id.clone(), preferences.clone());
        Ok(preferences)
    }

    async fn tests_for_user(&self, user_id: &str) -> PortResult<Vec<UserTest>> {
        let sample = |id: &str, test_type: &str, title: &str, summary: &str, day: i64| UserTest {
            id: id.to_string(),
            user_id: user_id.to_string(),
            test_type: test_type.to_string(),
            title: title.to_string(),
            status: "completed".to_string(),
            result_summary: Some(summary.to_string()),
            taken_at: seeded_at(day),
        };
        Ok(vec![
            sample("test-1", "mbti", "MBTI 성격 유형 검사", "INFP", 30),
            sample("test-2", "stress", "스트레스 자가진단", "보통", 45),
            sample("test-3", "depression", "우울감 자가진단", "낮음", 60),
        ])
    }
}
