/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and strength rules
/// - [`jwt`]: access and refresh tokens scoped to an organization
/// - [`google`]: Google ID token verification for "Sign in with Google"
/// - [`middleware`]: bearer token extraction and the request `AuthContext`
/// - [`permissions`]: the static role to permission table
/// - [`authorization`]: membership, permission and last-owner checks
///
/// # Example
///
/// ```no_run
/// use agencyhub_shared::auth::jwt::issue_token_pair;
/// use agencyhub_shared::auth::password::{hash_password, verify_password};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Brief#Deadline9")?;
/// if verify_password("Brief#Deadline9", &hash)? {
///     let tokens = issue_token_pair(Uuid::new_v4(), Uuid::new_v4(), "a-secret-of-at-least-32-bytes!!")?;
///     println!("{}", tokens.token);
/// }
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod google;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod permissions;
