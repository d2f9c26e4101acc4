use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use for4_core::{ClientSettings, Identity, Notification, Notifier};
use for4_crypto::EnvelopeCodec;
use for4_realtime::{
    CallError, CallOptions, ConnectionManager, ConnectionOptions, Exchange, Transport,
};
use for4_state::{repository::Repository, SettingItem};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    exchanges::{
        ForgotPassword, ForgotPasswordRequest, Login, LoginRequest, Register, RegisterRequest,
        ResetPassword, ResetPasswordRequest, TokenRequest, VerificarToken,
    },
    CredentialStore, SessionError,
};

/// Who the client is acting as.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// The stored credential has not been checked yet.
    Unknown,
    #[allow(missing_docs)]
    Authenticated(Identity),
    #[allow(missing_docs)]
    Anonymous,
}

impl SessionState {
    #[allow(missing_docs)]
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }
}

/// Authentication and session lifecycle.
///
/// The session owns the realtime connection of the authenticated user. It is created when the
/// session becomes authenticated and torn down when it ends. Consumers get it through
/// [`SessionClient::connection`].
///
/// Exchanges that happen before authentication (login, token verification, registration and
/// password recovery) run over a short-lived connection that is closed as soon as the exchange
/// completes.
#[derive(Clone)]
pub struct SessionClient {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    codec: EnvelopeCodec,
    options: ConnectionOptions,
    connect_timeout: Duration,
    credentials: CredentialStore,
    notifier: Arc<dyn Notifier>,
    state: watch::Sender<SessionState>,
    connection: Mutex<Option<ConnectionManager>>,
}

impl SessionClient {
    #[allow(missing_docs)]
    pub fn new(
        settings: &ClientSettings,
        transport: Arc<dyn Transport>,
        repository: Arc<dyn Repository<SettingItem>>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                codec: settings.envelope_codec(),
                options: ConnectionOptions::from_settings(settings),
                connect_timeout: settings.connect_timeout(),
                credentials: CredentialStore::new(repository),
                notifier,
                state: watch::channel(SessionState::Unknown).0,
                connection: Mutex::new(None),
            }),
        }
    }

    #[allow(missing_docs)]
    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Watch session state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    #[allow(missing_docs)]
    pub fn is_authenticated(&self) -> bool {
        matches!(*self.inner.state.borrow(), SessionState::Authenticated(_))
    }

    /// The identity of the authenticated user.
    pub fn user(&self) -> Option<Identity> {
        self.inner.state.borrow().identity().cloned()
    }

    /// The persisted bearer token.
    pub async fn token(&self) -> Result<Option<String>, SessionError> {
        Ok(self.inner.credentials.token().await?)
    }

    /// The realtime connection of the authenticated session.
    pub fn connection(&self) -> Option<ConnectionManager> {
        self.lock_connection().clone()
    }

    /// Where user-facing messages of this session go.
    pub fn notifier(&self) -> Arc<dyn Notifier> {
        self.inner.notifier.clone()
    }

    /// Restore the session from the persisted credential.
    ///
    /// Without a credential the session settles anonymous. A credential the server does not
    /// accept, or that can't be checked, is cleared.
    pub async fn initialize(&self) -> Result<SessionState, SessionError> {
        let Some(token) = self.inner.credentials.token().await? else {
            debug!("No stored credential");
            self.set_state(SessionState::Anonymous);
            return Ok(self.state());
        };

        match self
            .exchange::<VerificarToken>(&TokenRequest {
                token: token.clone(),
            })
            .await
        {
            Ok(response) => {
                self.inner.credentials.save(&token, &response.user).await?;
                self.authenticate(response.user);
            }
            Err(error) => {
                warn!(%error, "Stored credential rejected");
                self.invalidate().await?;
            }
        }

        Ok(self.state())
    }

    /// Log in with email and password.
    pub async fn login(&self, email: &str, password: &str) -> Result<Identity, SessionError> {
        let request = LoginRequest {
            email: email.to_owned(),
            password: password.to_owned(),
        };

        let response = match self.exchange::<Login>(&request).await {
            Ok(response) => response,
            Err(error) => {
                self.inner
                    .notifier
                    .notify(Notification::error(error.user_message()));
                if !self.is_authenticated() {
                    self.set_state(SessionState::Anonymous);
                }
                return Err(error.into());
            }
        };

        self.inner
            .credentials
            .save(&response.token, &response.user)
            .await?;
        info!(user = %response.user.name, "Logged in");
        self.inner.notifier.notify(Notification::success(format!(
            "Welcome, {}!",
            response.user.name
        )));
        self.authenticate(response.user.clone());

        Ok(response.user)
    }

    /// Create an account. Does not log in.
    pub async fn register(&self, request: RegisterRequest) -> Result<(), SessionError> {
        self.acknowledged::<Register>(&request, "Account created! Log in to continue.")
            .await
    }

    /// Ask the server to send a password recovery email.
    pub async fn forgot_password(&self, email: &str) -> Result<(), SessionError> {
        self.acknowledged::<ForgotPassword>(
            &ForgotPasswordRequest {
                email: email.to_owned(),
            },
            "Recovery email sent! Check your inbox.",
        )
        .await
    }

    /// Set a new password with a recovery token.
    pub async fn reset_password(&self, token: &str, password: &str) -> Result<(), SessionError> {
        self.acknowledged::<ResetPassword>(
            &ResetPasswordRequest {
                token: token.to_owned(),
                password: password.to_owned(),
            },
            "Password changed! Log in with your new password.",
        )
        .await
    }

    /// Replace the cached identity, keeping the current credential.
    pub async fn update_user(&self, user: Identity) -> Result<(), SessionError> {
        let token = self
            .inner
            .credentials
            .token()
            .await?
            .ok_or(SessionError::NotAuthenticated)?;
        self.inner.credentials.save(&token, &user).await?;
        self.set_state(SessionState::Authenticated(user));
        Ok(())
    }

    /// End the session.
    pub async fn logout(&self) -> Result<(), SessionError> {
        self.end_session().await?;
        info!("Logged out");
        self.inner
            .notifier
            .notify(Notification::success("Logged out."));
        Ok(())
    }

    /// End the session because the server no longer accepts its credential.
    pub async fn invalidate(&self) -> Result<(), SessionError> {
        self.end_session().await
    }

    /// Wait until the session has a connected realtime connection.
    pub async fn wait_for_connection(&self, timeout: Duration) -> Option<ConnectionManager> {
        let connection = self.connection()?;
        connection
            .wait_until_connected(timeout)
            .await
            .then_some(connection)
    }

    async fn end_session(&self) -> Result<(), SessionError> {
        if let Some(connection) = self.lock_connection().take() {
            connection.shutdown();
        }
        self.set_state(SessionState::Anonymous);
        self.inner.credentials.clear().await?;
        Ok(())
    }

    async fn acknowledged<E: Exchange>(
        &self,
        request: &E::Request,
        success: &str,
    ) -> Result<(), SessionError> {
        match self.exchange::<E>(request).await {
            Ok(_) => {
                self.inner.notifier.notify(Notification::success(success));
                Ok(())
            }
            Err(error) => {
                self.inner
                    .notifier
                    .notify(Notification::error(error.user_message()));
                Err(error.into())
            }
        }
    }

    fn authenticate(&self, user: Identity) {
        let mut options = self.inner.options.clone();
        options.room = user.id.clone();

        let previous = self.lock_connection().replace(ConnectionManager::start(
            self.inner.transport.clone(),
            self.inner.codec.clone(),
            options,
        ));
        if let Some(previous) = previous {
            previous.shutdown();
        }
        self.set_state(SessionState::Authenticated(user));
    }

    /// Run an exchange on the session connection, or on a short-lived one before authentication.
    async fn exchange<E: Exchange>(&self, request: &E::Request) -> Result<E::Response, CallError> {
        if let Some(connection) = self.connection().filter(ConnectionManager::connected) {
            return connection
                .call_exchange::<E>(request, CallOptions::default())
                .await;
        }

        let bootstrap = ConnectionManager::start(
            self.inner.transport.clone(),
            self.inner.codec.clone(),
            ConnectionOptions {
                reconnection_attempts: 0,
                room: None,
                ..self.inner.options.clone()
            },
        );
        let result = if bootstrap
            .wait_until_connected(self.inner.connect_timeout)
            .await
        {
            bootstrap
                .call_exchange::<E>(request, CallOptions::default())
                .await
        } else {
            Err(CallError::NotConnected)
        };
        bootstrap.shutdown();

        result
    }

    fn set_state(&self, state: SessionState) {
        debug!(?state, "Session state changed");
        self.inner.state.send_replace(state);
    }

    fn lock_connection(&self) -> MutexGuard<'_, Option<ConnectionManager>> {
        self.inner
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
