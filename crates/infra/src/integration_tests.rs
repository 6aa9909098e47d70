//! Integration tests for the full account pipeline.
//!
//! Tests: AccountService → InMemoryUserStore → claims / sign-in state
//!
//! Verifies:
//! - Registration, login and listing work end to end
//! - Store-level password policy surfaces through registration
//! - Claim replacement leaves exactly the new claim set
//! - Failed logins never touch lockout state

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use warden_auth::{
        AccessPolicy, Capabilities, ChangeUserClaimsRequest, ClaimType, CreateUserRequest,
        LoginUserRequest, Principal, ServiceResponse, UserStore, authorize,
    };

    use crate::store::{InMemoryUserStore, SignInState};

    type Service = warden_auth::AccountService<Arc<InMemoryUserStore>>;

    fn setup() -> (Service, Arc<InMemoryUserStore>) {
        let store = Arc::new(InMemoryUserStore::new());
        (Service::new(store.clone()), store)
    }

    fn registration(email: &str, password: &str, policy: &str) -> CreateUserRequest {
        CreateUserRequest {
            email: email.to_string(),
            name: "Test User".to_string(),
            password: password.to_string(),
            policy: policy.to_string(),
        }
    }

    fn login(email: &str, password: &str) -> LoginUserRequest {
        LoginUserRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn register_login_and_list() {
        let (service, _) = setup();

        let created = service
            .create_user(&registration("a@b.com", "Str0ng!Pass", "User"))
            .await
            .unwrap();
        assert_eq!(created, ServiceResponse::ok_with("User Created"));

        let logged_in = service.login(&login("a@b.com", "Str0ng!Pass")).await.unwrap();
        assert_eq!(logged_in, ServiceResponse::ok());

        let rows = service.users_with_claims().await.unwrap();
        let row = rows.iter().find(|r| r.email == "a@b.com").unwrap();
        assert_eq!(row.role_name, "User");
        assert_eq!(row.name, "Test User");
        assert!(!row.capabilities.read);
        assert!(!row.capabilities.create);
    }

    #[tokio::test]
    async fn weak_password_fails_registration_with_store_descriptions() {
        let (service, store) = setup();

        let response = service
            .create_user(&registration("a@b.com", "password", "User"))
            .await
            .unwrap();

        assert!(!response.flag);
        assert_eq!(
            response.message.as_deref(),
            Some(
                "Passwords must have at least one non alphanumeric character.\n\
                 Passwords must have at least one digit ('0'-'9').\n\
                 Passwords must have at least one uppercase ('A'-'Z')."
            )
        );
        assert!(store.find_by_email("a@b.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn wrong_password_leaves_sign_in_state_untouched() {
        let (service, store) = setup();
        service
            .create_user(&registration("a@b.com", "Str0ng!Pass", "Manager"))
            .await
            .unwrap();
        let user = store.find_by_email("a@b.com").await.unwrap().unwrap();

        let response = service.login(&login("a@b.com", "Wr0ng!Pass")).await.unwrap();

        assert_eq!(response, ServiceResponse::failure("Incorrect Credentials Provided"));
        assert_eq!(store.sign_in_state(user.id).unwrap(), Some(SignInState::default()));
    }

    #[tokio::test]
    async fn update_claims_replaces_the_whole_set() {
        let (service, store) = setup();
        service
            .create_user(&registration("a@b.com", "Str0ng!Pass", "Admin"))
            .await
            .unwrap();
        let user = store.find_by_email("a@b.com").await.unwrap().unwrap();
        assert_eq!(store.get_claims(&user).await.unwrap().len(), 8);

        let request = ChangeUserClaimsRequest {
            user_id: user.id,
            role_name: "User".to_string(),
            name: "Demoted".to_string(),
            capabilities: Capabilities {
                read: true,
                ..Default::default()
            },
        };
        let response = service.update_user_claims(&request).await.unwrap();
        assert_eq!(response, ServiceResponse::ok_with("User Updated"));

        let claims = store.get_claims(&user).await.unwrap();
        assert_eq!(claims, request.replacement_claims("a@b.com"));
        for claim in &claims {
            let same_type = claims.iter().filter(|c| c.claim_type == claim.claim_type).count();
            assert_eq!(same_type, 1);
        }

        let principal = Principal::from_claims(user.id, &claims);
        assert!(authorize(&principal, AccessPolicy::Administration).is_err());
        assert!(authorize(&principal, AccessPolicy::UserOnly).is_ok());
    }

    #[tokio::test]
    async fn concurrent_updates_to_one_user_do_not_interleave() {
        let (service, store) = setup();
        let service = Arc::new(service);
        service
            .create_user(&registration("a@b.com", "Str0ng!Pass", "Admin"))
            .await
            .unwrap();
        let user = store.find_by_email("a@b.com").await.unwrap().unwrap();

        let handles: Vec<_> = ["First", "Second", "Third"]
            .into_iter()
            .map(|name| {
                let service = service.clone();
                let request = ChangeUserClaimsRequest {
                    user_id: user.id,
                    role_name: "Manager".to_string(),
                    name: name.to_string(),
                    capabilities: Capabilities::default(),
                };
                tokio::spawn(async move { service.update_user_claims(&request).await })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().unwrap().is_success());
        }

        let claims = store.get_claims(&user).await.unwrap();
        assert_eq!(claims.len(), 8);
        let names = claims.iter().filter(|c| c.claim_type == ClaimType::NAME).count();
        assert_eq!(names, 1);
    }

    #[tokio::test]
    async fn set_up_is_repeatable() {
        let (service, store) = setup();

        assert!(service.set_up().await.unwrap().is_success());
        assert!(!service.set_up().await.unwrap().is_success());

        assert_eq!(store.list_users().await.unwrap().len(), 1);
        let admin_login = service
            .login(&login(warden_auth::account::ADMIN_EMAIL, warden_auth::account::ADMIN_PASSWORD))
            .await
            .unwrap();
        assert!(admin_login.is_success());
    }
}
