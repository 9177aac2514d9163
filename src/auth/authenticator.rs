use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use super::csrf::generate_token;
use super::password::{hash_password, verify_password};
use super::session::{Session, SessionStore};
use crate::config::AppConfig;
use crate::database::activity::NewActivity;
use crate::database::models::User;
use crate::database::users::ADMIN_ROLE;
use crate::database::Database;
use crate::error::AppError;

/// Login, session resolution and permission checks.
#[derive(Clone)]
pub struct Authenticator {
    database: Database,
    sessions: Arc<dyn SessionStore>,
    lifetime: Duration,
    bcrypt_cost: u32,
}

impl Authenticator {
    pub fn new(database: Database, sessions: Arc<dyn SessionStore>, config: &AppConfig) -> Self {
        Self {
            database,
            sessions,
            lifetime: Duration::minutes(config.session.lifetime_minutes),
            bcrypt_cost: config.auth.bcrypt_cost,
        }
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    pub fn session_lifetime(&self) -> Duration {
        self.lifetime
    }

    pub async fn hash_password(&self, plain: &str) -> Result<String, AppError> {
        hash_password(plain, self.bcrypt_cost).await
    }

    /// Verify credentials and open a session with a fresh CSRF token.
    pub async fn login(
        &self,
        identifier: &str,
        secret: &str,
        ip_address: Option<&str>,
    ) -> Result<(Session, User), AppError> {
        if identifier.trim().is_empty() || secret.is_empty() {
            return Err(AppError::InvalidCredentials);
        }

        let user = match self.database.find_user_by_identifier(identifier).await? {
            Some(user) if user.is_active => user,
            _ => {
                warn!("Login failed for unknown or inactive account {:?}", identifier);
                return Err(AppError::InvalidCredentials);
            }
        };

        if !verify_password(secret, &user.password_hash).await? {
            warn!("Login failed for user {}: wrong password", user.id);
            return Err(AppError::InvalidCredentials);
        }

        let now = Utc::now();
        let session = Session {
            id: generate_token(),
            user_id: user.id,
            csrf_token: generate_token(),
            ip_address: ip_address.map(str::to_string),
            created_at: now,
            expires_at: now + self.lifetime,
        };
        self.sessions.create(&session).await?;
        self.database.record_login(user.id).await?;
        self.database
            .log_activity(NewActivity {
                user_id: Some(user.id),
                action: "auth.login",
                entity_type: Some("user"),
                entity_id: Some(user.id),
                ip_address,
                ..Default::default()
            })
            .await?;

        info!("User {} logged in", user.username);
        let user = self.database.get_user(user.id).await?.unwrap_or(user);
        Ok((session, user))
    }

    pub async fn logout(&self, session_id: &str) -> Result<(), AppError> {
        if let Some(session) = self.sessions.get(session_id).await? {
            self.database
                .log_activity(NewActivity {
                    user_id: Some(session.user_id),
                    action: "auth.logout",
                    entity_type: Some("user"),
                    entity_id: Some(session.user_id),
                    ..Default::default()
                })
                .await?;
        }
        self.sessions.destroy(session_id).await
    }

    /// Resolve a session id to its live session and active user, extending
    /// the session's expiry on success.
    pub async fn authenticate(&self, session_id: &str) -> Result<Option<(Session, User)>, AppError> {
        let now = Utc::now();
        let mut session = match self.sessions.get(session_id).await? {
            Some(session) if !session.is_expired(now) => session,
            Some(_) => {
                self.sessions.destroy(session_id).await?;
                return Ok(None);
            }
            None => return Ok(None),
        };

        let user = match self.database.get_user(session.user_id).await? {
            Some(user) if user.is_active => user,
            _ => return Ok(None),
        };

        session.expires_at = now + self.lifetime;
        self.sessions.touch(&session.id, session.expires_at).await?;
        Ok(Some((session, user)))
    }

    pub async fn is_logged_in(&self, session_id: &str) -> Result<bool, AppError> {
        Ok(self.authenticate(session_id).await?.is_some())
    }

    /// Admins hold every permission; other roles go through `role_permissions`.
    pub async fn has_permission(&self, user: &User, permission: &str) -> Result<bool, AppError> {
        if user.role_name == ADMIN_ROLE {
            return Ok(true);
        }
        self.database.role_has_permission(user.role_id, permission).await
    }

    pub async fn permissions_for(&self, user: &User) -> Result<Vec<String>, AppError> {
        if user.role_name == ADMIN_ROLE {
            return Ok(self
                .database
                .list_permissions()
                .await?
                .into_iter()
                .map(|p| p.name)
                .collect());
        }
        self.database.role_permissions(user.role_id).await
    }

    pub async fn regenerate_csrf(&self, session_id: &str) -> Result<String, AppError> {
        let token = generate_token();
        self.sessions.set_csrf_token(session_id, &token).await?;
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::MemorySessionStore;
    use crate::database::users::UserRecord;

    async fn setup(role: &str, active: bool) -> (Authenticator, User) {
        let db = Database::new_in_memory().await.unwrap();
        let mut config = AppConfig::default();
        config.auth.bcrypt_cost = 4;
        let auth = Authenticator::new(db.clone(), Arc::new(MemorySessionStore::new()), &config);

        let user = db
            .create_user(&UserRecord {
                username: "eva".to_string(),
                email: "eva@praxis.de".to_string(),
                password_hash: Some(auth.hash_password("geheim123").await.unwrap()),
                first_name: "Eva".to_string(),
                last_name: "Lang".to_string(),
                role: role.to_string(),
                is_active: active,
            })
            .await
            .unwrap();
        (auth, user)
    }

    #[tokio::test]
    async fn test_login_and_session_resolution() {
        let (auth, user) = setup("therapist", true).await;

        let (session, logged_in) = auth.login("EVA@praxis.de", "geheim123", None).await.unwrap();
        assert_eq!(logged_in.id, user.id);
        assert!(logged_in.last_login.is_some());
        assert!(auth.is_logged_in(&session.id).await.unwrap());

        let old_token = session.csrf_token.clone();
        let new_token = auth.regenerate_csrf(&session.id).await.unwrap();
        assert_ne!(old_token, new_token);

        auth.logout(&session.id).await.unwrap();
        assert!(!auth.is_logged_in(&session.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_authenticate_slides_expiry() {
        let (auth, _) = setup("therapist", true).await;
        let (session, _) = auth.login("eva", "geheim123", None).await.unwrap();

        let almost_expired = Utc::now() + Duration::seconds(30);
        auth.sessions().touch(&session.id, almost_expired).await.unwrap();

        let (resolved, _) = auth.authenticate(&session.id).await.unwrap().unwrap();
        assert!(resolved.expires_at > almost_expired + Duration::minutes(1));

        let stored = auth.sessions().get(&session.id).await.unwrap().unwrap();
        assert_eq!(stored.expires_at, resolved.expires_at);
    }

    #[tokio::test]
    async fn test_expired_session_is_removed() {
        let (auth, user) = setup("therapist", true).await;
        let now = Utc::now();
        let session = Session {
            id: generate_token(),
            user_id: user.id,
            csrf_token: generate_token(),
            ip_address: None,
            created_at: now - Duration::hours(3),
            expires_at: now - Duration::minutes(1),
        };
        auth.sessions().create(&session).await.unwrap();

        assert!(auth.authenticate(&session.id).await.unwrap().is_none());
        assert!(auth.sessions().get(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let (auth, _) = setup("therapist", true).await;
        assert!(matches!(
            auth.login("eva", "falsch", None).await,
            Err(AppError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("nobody", "geheim123", None).await,
            Err(AppError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_inactive_user_cannot_login() {
        let (auth, _) = setup("therapist", false).await;
        assert!(matches!(
            auth.login("eva", "geheim123", None).await,
            Err(AppError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_permissions() {
        let (auth, user) = setup("reception", true).await;
        assert!(auth.has_permission(&user, "owners.view").await.unwrap());
        assert!(!auth.has_permission(&user, "settings.edit").await.unwrap());

        let mut admin = user.clone();
        admin.role_name = ADMIN_ROLE.to_string();
        assert!(auth.has_permission(&admin, "settings.edit").await.unwrap());
    }
}
