/// Identity adapter: turns sign-in input into a local [`User`]
///
/// Two resolvers implement [`CredentialResolver`]:
///
/// - [`PasswordResolver`]: email and password checked against the stored
///   Argon2id hash. Every failure is the same [`ServiceError::InvalidCredentials`].
/// - [`ProviderResolver`]: a profile already verified by an external OAuth
///   provider. Unknown emails become new STUDENT accounts, and students get
///   their profile row created on first sign-in.
///
/// The module also holds the account flows that sit next to sign-in:
/// self-registration, admin seeding and session refresh.

use async_trait::async_trait;
use chrono::Duration;
use serde::Deserialize;
use tracing::{info, warn};

use super::jwt::{create_token, SessionClaims};
use super::password::{hash_password_with, validate_password_strength, verify_dummy, verify_password, HashParams};
use super::session::SessionContext;
use crate::error::{ServiceError, ServiceResult};
use crate::models::profile::{CreateStudent, CreateTeacher};
use crate::models::user::{CreateUser, UpdateProfile, User, UserRole};
use crate::store::{StoreError, UserStore};

/// Something that can authenticate a user from `Input`
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    type Input: Send;

    async fn resolve(&self, input: Self::Input) -> ServiceResult<User>;
}

/// Email and password typed into the login form
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordCredentials {
    pub email: String,
    pub password: String,
}

/// Profile returned by an OAuth provider after a successful code exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    /// Provider name, e.g. `"google"`
    pub provider: String,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
}

pub struct PasswordResolver<'a, S: ?Sized> {
    store: &'a S,
    /// Cost of the stand-in verification for accounts without a hash
    params: HashParams,
}

impl<'a, S: UserStore + ?Sized> PasswordResolver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            params: HashParams::default(),
        }
    }

    /// Matches the stand-in verification to the configured hashing cost
    pub fn with_params(mut self, params: HashParams) -> Self {
        self.params = params;
        self
    }
}

#[async_trait]
impl<S: UserStore + ?Sized> CredentialResolver for PasswordResolver<'_, S> {
    type Input = PasswordCredentials;

    async fn resolve(&self, input: PasswordCredentials) -> ServiceResult<User> {
        let user = self.store.find_user_by_email(input.email.trim()).await?;

        let Some((user, hash)) = user.and_then(|u| {
            let hash = u.password_hash.clone()?;
            Some((u, hash))
        }) else {
            verify_dummy(&input.password, &self.params);
            return Err(ServiceError::InvalidCredentials);
        };

        match verify_password(&input.password, &hash) {
            Ok(true) => Ok(user),
            Ok(false) => Err(ServiceError::InvalidCredentials),
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "Stored password hash is unusable");
                Err(ServiceError::InvalidCredentials)
            }
        }
    }
}

pub struct ProviderResolver<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: UserStore + ?Sized> ProviderResolver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: UserStore + ?Sized> CredentialResolver for ProviderResolver<'_, S> {
    type Input = ProviderProfile;

    async fn resolve(&self, profile: ProviderProfile) -> ServiceResult<User> {
        let email = profile.email.trim().to_lowercase();
        if email.is_empty() {
            return Err(ServiceError::invalid("email", "Provider did not return an email"));
        }

        let user = match self.store.find_user_by_email(&email).await? {
            Some(user) => fill_missing_profile(self.store, user, &profile).await?,
            None => {
                let created = self
                    .store
                    .create_user(CreateUser {
                        email: email.clone(),
                        name: profile.name.clone(),
                        image: profile.image.clone(),
                        password_hash: None,
                        role: UserRole::Student,
                    })
                    .await;

                match created {
                    Ok(user) => {
                        info!(user_id = %user.id, provider = %profile.provider, "Created user from provider sign-in");
                        user
                    }
                    // Lost a race with a concurrent first sign-in.
                    Err(StoreError::Conflict(_)) => self
                        .store
                        .find_user_by_email(&email)
                        .await?
                        .ok_or(ServiceError::NotFound("User".to_string()))?,
                    Err(e) => return Err(e.into()),
                }
            }
        };

        if user.role == UserRole::Student
            && self.store.find_student_by_user(user.id).await?.is_none()
        {
            self.store.create_student(CreateStudent::for_user(user.id)).await?;
            info!(user_id = %user.id, "Created student profile");
        }

        Ok(user)
    }
}

/// Copies name and avatar from the provider when the account has none
async fn fill_missing_profile<S: UserStore + ?Sized>(
    store: &S,
    user: User,
    profile: &ProviderProfile,
) -> ServiceResult<User> {
    let update = UpdateProfile {
        name: user.name.is_none().then(|| profile.name.clone()).flatten(),
        image: user.image.is_none().then(|| profile.image.clone()).flatten(),
    };
    if update.is_empty() {
        return Ok(user);
    }
    Ok(store.update_user_profile(user.id, update).await?.unwrap_or(user))
}

/// Signs a session token describing `user`
///
/// # Returns
///
/// The encoded token and the claims inside it
pub fn issue_session(
    user: &User,
    secret: &str,
    lifetime: Duration,
) -> ServiceResult<(String, SessionClaims)> {
    let claims = SessionClaims::for_user(user, lifetime);
    let token = create_token(&claims, secret)
        .map_err(|e| ServiceError::internal("Could not create session", e))?;
    Ok((token, claims))
}

/// Self-registration input
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

/// Creates a STUDENT account with a password and its student profile
///
/// # Errors
///
/// - `ValidationFailed` when the password is too weak
/// - `Conflict` when the email is already registered
pub async fn register<S: UserStore + ?Sized>(
    store: &S,
    registration: Registration,
    params: &HashParams,
) -> ServiceResult<User> {
    validate_password_strength(&registration.password)
        .map_err(|msg| ServiceError::invalid("password", msg))?;

    let password_hash = hash_password_with(&registration.password, params)
        .map_err(|e| ServiceError::internal("Could not hash password", e))?;

    let user = store
        .create_user(CreateUser {
            email: registration.email.trim().to_lowercase(),
            name: registration.name,
            image: None,
            password_hash: Some(password_hash),
            role: UserRole::Student,
        })
        .await?;
    store.create_student(CreateStudent::for_user(user.id)).await?;

    info!(user_id = %user.id, "Registered new student");
    Ok(user)
}

/// Admin-created account of any role
#[derive(Debug, Clone)]
pub struct SeedUser {
    pub email: String,
    pub name: Option<String>,
    pub role: UserRole,
    /// Leave `None` for accounts that will only sign in through a provider
    pub password: Option<String>,
    pub bio: Option<String>,
    pub languages: Vec<String>,
}

/// Creates an account with the requested role and the matching profile row
pub async fn seed_user<S: UserStore + ?Sized>(
    store: &S,
    seed: SeedUser,
    params: &HashParams,
) -> ServiceResult<User> {
    let password_hash = match seed.password.as_deref() {
        Some(password) => {
            validate_password_strength(password)
                .map_err(|msg| ServiceError::invalid("password", msg))?;
            Some(
                hash_password_with(password, params)
                    .map_err(|e| ServiceError::internal("Could not hash password", e))?,
            )
        }
        None => None,
    };

    let user = store
        .create_user(CreateUser {
            email: seed.email.trim().to_lowercase(),
            name: seed.name,
            image: None,
            password_hash,
            role: seed.role,
        })
        .await?;

    match seed.role {
        UserRole::Student => {
            store.create_student(CreateStudent::for_user(user.id)).await?;
        }
        UserRole::Teacher => {
            store
                .create_teacher(CreateTeacher {
                    user_id: user.id,
                    bio: seed.bio,
                    languages: seed.languages,
                })
                .await?;
        }
        UserRole::Admin => {}
    }

    info!(user_id = %user.id, role = %user.role, "Seeded user");
    Ok(user)
}

/// Re-reads the caller's account, applying any profile changes first
///
/// The returned user is what the refreshed session token must describe.
pub async fn refresh_session<S: UserStore + ?Sized>(
    store: &S,
    session: &SessionContext,
    update: UpdateProfile,
) -> ServiceResult<User> {
    let user = if update.is_empty() {
        store.find_user_by_id(session.user_id).await?
    } else {
        store.update_user_profile(session.user_id, update).await?
    };

    // A token for a user that no longer exists is not a session.
    user.ok_or(ServiceError::AuthenticationRequired)
}
