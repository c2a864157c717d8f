//! The interaction controller.
//!
//! Drives one interaction from its pending prompt to a finished or aborted
//! result. Everything it reads and writes goes through the provider, the
//! account resolver and the grant service; it holds no state of its own.

use std::sync::Arc;

use super::details::{AuthorizationParams, InteractionDetails, PromptName};
use super::outcome::{InteractionOutcome, MergeMode};
use super::state::{InteractionEvent, InteractionState};
use crate::account::AccountResolver;
use crate::error::{InteractionError, InteractionResult};
use crate::grant::{GrantService, MissingGrants};
use crate::provider::InteractionProvider;

/// Flash shown when the submitted credentials do not match an account.
pub const INVALID_CREDENTIALS: &str = "Invalid email or password.";

/// Data for the login form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginView {
    pub uid: String,
    pub client_id: String,
    pub client_name: String,
    pub params: AuthorizationParams,
    /// Pre-filled email.
    pub login_hint: Option<String>,
    pub flash: Option<String>,
}

/// Data for the consent page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentView {
    pub uid: String,
    pub client_id: String,
    pub client_name: String,
    pub params: AuthorizationParams,
    pub prompt: PromptName,
    pub missing: MissingGrants,
}

/// What the entry page renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryView {
    Login(LoginView),
    Consent(ConsentView),
}

/// A finished interaction, ready to hand back to the provider's redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finalization {
    pub redirect_to: String,
    pub state: InteractionState,
    pub outcome: InteractionOutcome,
    pub merge: MergeMode,
}

/// Result of a login submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginSubmission {
    Finished(Finalization),
    /// Credentials did not match. The interaction is still pending.
    Rejected(LoginView),
}

/// Login and consent state machine over the provider boundary.
pub struct InteractionController {
    provider: Arc<dyn InteractionProvider>,
    accounts: Arc<dyn AccountResolver>,
    grants: GrantService,
}

impl InteractionController {
    #[must_use]
    pub fn new(
        provider: Arc<dyn InteractionProvider>,
        accounts: Arc<dyn AccountResolver>,
        grants: GrantService,
    ) -> Self {
        Self {
            provider,
            accounts,
            grants,
        }
    }

    async fn details(&self, uid: &str) -> InteractionResult<InteractionDetails> {
        self.provider
            .interaction_details(uid)
            .await?
            .ok_or_else(|| InteractionError::not_found(uid))
    }

    /// Resolves the client id and display name of an interaction.
    async fn client_of(&self, details: &InteractionDetails) -> InteractionResult<(String, String)> {
        let client_id = details
            .params
            .client_id()
            .ok_or_else(|| InteractionError::invalid_request("interaction has no client_id"))?;
        let client = self
            .provider
            .find_client(client_id)
            .await?
            .ok_or_else(|| InteractionError::unknown_client(client_id))?;
        Ok((client.client_id.clone(), client.display_name().to_string()))
    }

    async fn login_view(
        &self,
        details: InteractionDetails,
        login_hint: Option<String>,
        flash: Option<String>,
    ) -> InteractionResult<LoginView> {
        let (client_id, client_name) = self.client_of(&details).await?;
        let login_hint = login_hint.or_else(|| details.params.login_hint().map(str::to_owned));
        Ok(LoginView {
            uid: details.uid,
            client_id,
            client_name,
            params: details.params,
            login_hint,
            flash,
        })
    }

    async fn finish(
        &self,
        uid: &str,
        state: InteractionState,
        outcome: InteractionOutcome,
        merge: MergeMode,
    ) -> InteractionResult<Finalization> {
        let redirect_to = self
            .provider
            .interaction_finished(uid, outcome.clone(), merge)
            .await?;
        Ok(Finalization {
            redirect_to,
            state,
            outcome,
            merge,
        })
    }

    /// Renders the pending prompt. Reads only.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for a missing or expired interaction and
    /// `UnknownClient` if its client is not registered.
    pub async fn entry(&self, uid: &str) -> InteractionResult<EntryView> {
        let details = self.details(uid).await?;

        if details.prompt.name == PromptName::Login {
            return Ok(EntryView::Login(self.login_view(details, None, None).await?));
        }

        let (client_id, client_name) = self.client_of(&details).await?;
        Ok(EntryView::Consent(ConsentView {
            uid: details.uid,
            client_id,
            client_name,
            params: details.params,
            prompt: details.prompt.name,
            missing: details.prompt.details,
        }))
    }

    /// Handles a login submission.
    ///
    /// Wrong credentials are not an error: the form comes back with the
    /// email pre-filled and a flash, and the interaction stays pending.
    ///
    /// # Errors
    ///
    /// Returns `SequenceViolation` if the pending prompt is not `login`,
    /// and resolver, store or provider failures.
    pub async fn submit_login(
        &self,
        uid: &str,
        email: &str,
        password: &str,
    ) -> InteractionResult<LoginSubmission> {
        let details = self.details(uid).await?;
        let state = InteractionState::of(&details);
        // Checks the pending prompt before any credential is looked at.
        let rejected = state.apply(InteractionEvent::LoginRejected)?;

        match self.accounts.authenticate(email, password).await? {
            Some(account_id) => {
                let state = state.apply(InteractionEvent::LoginSucceeded)?;
                tracing::info!(uid, account_id = %account_id, "Login succeeded");
                let finalization = self
                    .finish(
                        uid,
                        state,
                        InteractionOutcome::login(account_id),
                        MergeMode::Replace,
                    )
                    .await?;
                Ok(LoginSubmission::Finished(finalization))
            }
            None => {
                tracing::info!(uid, state = %rejected, "Login rejected");
                let view = self
                    .login_view(
                        details,
                        Some(email.to_string()),
                        Some(INVALID_CREDENTIALS.to_string()),
                    )
                    .await?;
                Ok(LoginSubmission::Rejected(view))
            }
        }
    }

    /// Handles a consent submission: merges the missing grants into the
    /// interaction's grant and finishes on top of the login result.
    ///
    /// # Errors
    ///
    /// Returns `SequenceViolation` if the pending prompt is not `consent`,
    /// `MissingSession` if no account is logged in, and store or provider
    /// failures.
    pub async fn submit_consent(&self, uid: &str) -> InteractionResult<Finalization> {
        let details = self.details(uid).await?;
        if details.prompt.name != PromptName::Consent {
            return Err(InteractionError::sequence_violation(
                PromptName::Consent.as_str(),
                details.prompt.name.as_str(),
            ));
        }
        let state = InteractionState::of(&details).apply(InteractionEvent::ConsentGiven)?;

        let account_id = details
            .account_id()
            .ok_or_else(|| InteractionError::missing_session(uid))?;
        let client_id = details
            .params
            .client_id()
            .ok_or_else(|| InteractionError::invalid_request("interaction has no client_id"))?;

        let grant = self
            .grants
            .merge_consent(
                details.grant_id.as_deref(),
                account_id,
                client_id,
                &details.prompt.details,
            )
            .await?;

        tracing::info!(uid, grant_id = %grant.id, "Consent given");
        self.finish(
            uid,
            state,
            InteractionOutcome::consent(grant.id),
            MergeMode::MergeWithLastSubmission,
        )
        .await
    }

    /// Aborts the interaction with `access_denied`, discarding any earlier
    /// submission, including a result that has not been resumed yet.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for a missing or expired interaction, and store or
    /// provider failures.
    pub async fn abort(&self, uid: &str) -> InteractionResult<Finalization> {
        let details = self.details(uid).await?;
        let state = InteractionState::of(&details).apply(InteractionEvent::Abort)?;

        tracing::info!(uid, "Interaction aborted by end-user");
        self.finish(uid, state, InteractionOutcome::aborted(), MergeMode::Replace)
            .await
    }
}

impl std::fmt::Debug for InteractionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionController")
            .field("grants", &self.grants)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use async_trait::async_trait;
    use oidc_store::{MemoryArtifactStore, RetryPolicy};

    use super::*;
    use crate::account::{AccountResult, StaticAccountResolver, hash_password};
    use crate::client::{ClientRegistry, default_client};
    use crate::config::AccountConfig;
    use crate::interaction::details::Prompt;
    use crate::policy::TtlPolicyTable;
    use crate::provider::StoreInteractionProvider;

    const RETURN_TO: &str = "http://localhost:3000/auth/resume";

    struct Fixture {
        controller: InteractionController,
        provider: Arc<StoreInteractionProvider>,
        grants: GrantService,
    }

    fn fixture_with(accounts: Arc<dyn AccountResolver>) -> Fixture {
        let store = Arc::new(MemoryArtifactStore::new());
        let provider = Arc::new(
            StoreInteractionProvider::new(
                store.clone(),
                ClientRegistry::new([default_client()]),
                TtlPolicyTable::default(),
            )
            .with_retry(RetryPolicy::none()),
        );
        let grants =
            GrantService::new(store, TtlPolicyTable::default()).with_retry(RetryPolicy::none());
        let controller = InteractionController::new(provider.clone(), accounts, grants.clone());
        Fixture {
            controller,
            provider,
            grants,
        }
    }

    fn fixture() -> Fixture {
        let accounts = StaticAccountResolver::new([AccountConfig {
            id: "alice".into(),
            email: "a@x.com".into(),
            password_hash: hash_password("right").unwrap(),
        }]);
        fixture_with(Arc::new(accounts))
    }

    fn params() -> AuthorizationParams {
        AuthorizationParams::default()
            .with("client_id", "foo")
            .with("scope", "openid email profile")
    }

    fn consent_prompt(scopes: &[&str]) -> Prompt {
        Prompt::consent(MissingGrants {
            oidc_scope: scopes.iter().map(|s| s.to_string()).collect(),
            ..MissingGrants::default()
        })
    }

    async fn login_interaction(fx: &Fixture) -> String {
        fx.provider
            .create_interaction(InteractionDetails::new(Prompt::login(), params()), RETURN_TO)
            .await
            .unwrap()
    }

    async fn consent_interaction(fx: &Fixture, details: InteractionDetails) -> String {
        fx.provider.create_interaction(details, RETURN_TO).await.unwrap()
    }

    #[tokio::test]
    async fn test_entry_branches_on_prompt() {
        let fx = fixture();
        let uid = login_interaction(&fx).await;
        match fx.controller.entry(&uid).await.unwrap() {
            EntryView::Login(view) => {
                assert_eq!(view.uid, uid);
                assert_eq!(view.client_id, "foo");
                assert!(view.flash.is_none());
            }
            other => panic!("expected login view, got {other:?}"),
        }

        let details = InteractionDetails::new(consent_prompt(&["email"]), params())
            .with_session("alice");
        let uid = consent_interaction(&fx, details).await;
        match fx.controller.entry(&uid).await.unwrap() {
            EntryView::Consent(view) => {
                assert_eq!(view.missing.oidc_scope, vec!["email"]);
                assert_eq!(view.prompt, PromptName::Consent);
            }
            other => panic!("expected consent view, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_entry_unknown_interaction() {
        let fx = fixture();
        let err = fx.controller.entry("missing").await.unwrap_err();
        assert!(matches!(err, InteractionError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_entry_unknown_client() {
        let fx = fixture();
        let details = InteractionDetails::new(
            Prompt::login(),
            AuthorizationParams::default().with("client_id", "nope"),
        );
        let uid = consent_interaction(&fx, details).await;
        let err = fx.controller.entry(&uid).await.unwrap_err();
        assert!(matches!(err, InteractionError::UnknownClient { .. }));
    }

    #[tokio::test]
    async fn test_wrong_password_rerenders_with_flash() {
        let fx = fixture();
        let uid = login_interaction(&fx).await;

        let submission = fx
            .controller
            .submit_login(&uid, "a@x.com", "wrong")
            .await
            .unwrap();
        let LoginSubmission::Rejected(view) = submission else {
            panic!("expected rejection");
        };
        assert_eq!(view.flash.as_deref(), Some("Invalid email or password."));
        assert_eq!(view.login_hint.as_deref(), Some("a@x.com"));

        let details = fx.provider.interaction_details(&uid).await.unwrap().unwrap();
        assert_eq!(InteractionState::of(&details), InteractionState::PendingLogin);
    }

    #[tokio::test]
    async fn test_successful_login_finishes_without_merge() {
        let fx = fixture();
        let uid = login_interaction(&fx).await;

        let LoginSubmission::Finished(done) = fx
            .controller
            .submit_login(&uid, "A@X.com", "right")
            .await
            .unwrap()
        else {
            panic!("expected finalization");
        };
        assert_eq!(done.redirect_to, RETURN_TO);
        assert_eq!(done.state, InteractionState::Finished);
        assert_eq!(done.merge, MergeMode::Replace);
        assert_eq!(done.outcome, InteractionOutcome::login("alice"));
    }

    #[tokio::test]
    async fn test_login_on_consent_prompt_is_sequence_violation() {
        let fx = fixture();
        let details = InteractionDetails::new(consent_prompt(&["email"]), params())
            .with_session("alice");
        let uid = consent_interaction(&fx, details).await;

        let err = fx
            .controller
            .submit_login(&uid, "a@x.com", "right")
            .await
            .unwrap_err();
        assert!(matches!(err, InteractionError::SequenceViolation { .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_consent_on_login_prompt_is_sequence_violation() {
        let fx = fixture();
        let uid = login_interaction(&fx).await;
        let err = fx.controller.submit_consent(&uid).await.unwrap_err();
        assert!(matches!(err, InteractionError::SequenceViolation { .. }));
    }

    #[tokio::test]
    async fn test_consent_creates_then_reuses_grant() {
        let fx = fixture();

        let mut details = InteractionDetails::new(consent_prompt(&["email", "profile"]), params())
            .with_session("alice");
        details.last_submission = Some(InteractionOutcome::login("alice"));
        let uid = consent_interaction(&fx, details).await;

        let done = fx.controller.submit_consent(&uid).await.unwrap();
        assert_eq!(done.merge, MergeMode::MergeWithLastSubmission);
        let grant_id = done.outcome.consent.unwrap().grant_id;

        let grant = fx.grants.find(&grant_id).await.unwrap().unwrap();
        let expected: BTreeSet<String> = ["email", "profile"].iter().map(|s| s.to_string()).collect();
        assert_eq!(grant.oidc_scope, expected);

        // the stored result carries both decisions
        let result = fx
            .provider
            .interaction_details(&uid)
            .await
            .unwrap()
            .unwrap()
            .result
            .unwrap();
        assert_eq!(result.login.unwrap().account_id, "alice");

        // second consent on the same grant, narrower request
        let details = InteractionDetails::new(consent_prompt(&["email"]), params())
            .with_session("alice")
            .with_grant_id(&grant_id);
        let uid = consent_interaction(&fx, details).await;
        let done = fx.controller.submit_consent(&uid).await.unwrap();
        assert_eq!(done.outcome.consent.unwrap().grant_id, grant_id);

        let grant = fx.grants.find(&grant_id).await.unwrap().unwrap();
        assert_eq!(grant.oidc_scope, expected);
    }

    #[tokio::test]
    async fn test_consent_without_session() {
        let fx = fixture();
        let uid = consent_interaction(
            &fx,
            InteractionDetails::new(consent_prompt(&["email"]), params()),
        )
        .await;
        let err = fx.controller.submit_consent(&uid).await.unwrap_err();
        assert!(matches!(err, InteractionError::MissingSession { .. }));
    }

    #[tokio::test]
    async fn test_abort_replaces_prior_submissions() {
        let fx = fixture();
        let mut details = InteractionDetails::new(consent_prompt(&["email"]), params())
            .with_session("alice");
        details.last_submission = Some(InteractionOutcome::login("alice"));
        let uid = consent_interaction(&fx, details).await;

        let done = fx.controller.abort(&uid).await.unwrap();
        assert_eq!(done.state, InteractionState::Aborted);
        assert_eq!(done.merge, MergeMode::Replace);

        let result = fx
            .provider
            .interaction_details(&uid)
            .await
            .unwrap()
            .unwrap()
            .result
            .unwrap();
        assert_eq!(
            result,
            InteractionOutcome {
                error: Some("access_denied".into()),
                error_description: Some("End-User aborted interaction".into()),
                ..InteractionOutcome::default()
            }
        );

        // aborting twice is not an error
        let again = fx.controller.abort(&uid).await.unwrap();
        assert_eq!(again.outcome, InteractionOutcome::aborted());
    }

    #[tokio::test]
    async fn test_login_resubmission_before_resume() {
        let fx = fixture();
        let uid = login_interaction(&fx).await;

        for _ in 0..2 {
            let submission = fx
                .controller
                .submit_login(&uid, "a@x.com", "right")
                .await
                .unwrap();
            assert!(matches!(submission, LoginSubmission::Finished(_)));
        }

        let result = fx
            .provider
            .interaction_details(&uid)
            .await
            .unwrap()
            .unwrap()
            .result
            .unwrap();
        assert_eq!(result, InteractionOutcome::login("alice"));
    }

    #[tokio::test]
    async fn test_abort_after_login_wins() {
        let fx = fixture();
        let uid = login_interaction(&fx).await;
        fx.controller
            .submit_login(&uid, "a@x.com", "right")
            .await
            .unwrap();

        let done = fx.controller.abort(&uid).await.unwrap();
        assert_eq!(done.state, InteractionState::Aborted);
        assert_eq!(done.merge, MergeMode::Replace);

        let result = fx
            .provider
            .interaction_details(&uid)
            .await
            .unwrap()
            .unwrap()
            .result
            .unwrap();
        assert_eq!(result, InteractionOutcome::aborted());
        assert!(result.login.is_none());
    }

    #[tokio::test]
    async fn test_consent_resubmission_keeps_grant() {
        let fx = fixture();
        let details = InteractionDetails::new(consent_prompt(&["email"]), params())
            .with_session("alice");
        let uid = consent_interaction(&fx, details).await;

        let first = fx.controller.submit_consent(&uid).await.unwrap();
        let second = fx.controller.submit_consent(&uid).await.unwrap();
        assert_eq!(first.state, InteractionState::Finished);
        assert_eq!(second.state, InteractionState::Finished);
        assert!(second.outcome.consent.is_some());
    }

    struct FailingResolver;

    #[async_trait]
    impl AccountResolver for FailingResolver {
        async fn authenticate(&self, _email: &str, _password: &str) -> AccountResult<Option<String>> {
            Err(crate::account::AccountError::unavailable("ldap down"))
        }
    }

    #[tokio::test]
    async fn test_resolver_failure_is_server_error() {
        let fx = fixture_with(Arc::new(FailingResolver));
        let uid = login_interaction(&fx).await;
        let err = fx
            .controller
            .submit_login(&uid, "a@x.com", "right")
            .await
            .unwrap_err();
        assert!(matches!(err, InteractionError::Resolver(_)));
        assert!(err.is_server_error());
        assert!(err.is_retryable());
    }
}
