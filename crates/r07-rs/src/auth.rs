// crates/r07-rs/src/auth.rs
//! Card authorization flow: nozzle-out arms the reader, a detected card is
//! matched against the user directory, an authorized match requests an
//! AUTHORIZE poll and opens a cooldown window.

use crate::hal::{CardEvent, CardReader, ReaderEvent};
use crate::store::AuthContext;
use crate::users::UserManager;
use log::{debug, info, warn};

/// Cooldown after a successful authorization during which new card-read
/// requests are suppressed.
pub const AUTH_COOLDOWN_MS: u64 = 10_000;

/// Short user-facing messages. The presentation layer maps these to labels;
/// the core only names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMessage {
    /// A card read was requested; the driver is waiting for a tap.
    CardExpected,
    /// Back to idle (nozzle returned or sale finished).
    Idle,
    AuthorizedUser,
    UnauthorizedUser,
    /// The AUTHORIZE command was issued to the dispenser.
    PumpAuthorized,
    ReaderFailure,
}

/// Output of the controller, drained by the worker runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    /// Authorization outcome for the store. Emitted for every detected card,
    /// matched or not, so the log layers see each read.
    Result(AuthContext),
    Message(AuthMessage),
    /// The runtime should send a CD1 AUTHORIZE (DCC `0x06`) to the pump.
    AuthorizePump,
    /// Reader-level failure text.
    Error(String),
}

/// Orchestrates the reader around nozzle events.
///
/// Time is injected as monotonic milliseconds (`now_ms`), so the cooldown
/// survives wall-clock adjustments and tests never sleep.
pub struct RfidAuthController<R: CardReader> {
    reader: R,
    users: UserManager,
    waiting_for_card: bool,
    cooldown_until_ms: Option<u64>,
}

impl<R: CardReader> RfidAuthController<R> {
    pub fn new(reader: R, users: UserManager) -> Self {
        Self {
            reader,
            users,
            waiting_for_card: false,
            cooldown_until_ms: None,
        }
    }

    pub fn users(&self) -> &UserManager {
        &self.users
    }

    pub fn reader_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Nozzle left the holster: start a card read unless a recent
    /// authorization still holds the cooldown.
    pub fn handle_nozzle_out(&mut self, now_ms: u64) -> Vec<AuthEvent> {
        if let Some(until) = self.cooldown_until_ms {
            if now_ms < until {
                debug!("nozzle-out ignored, auth cooldown active for {} ms", until - now_ms);
                return Vec::new();
            }
            // Cooldown expired; resume the normal flow transparently.
            self.cooldown_until_ms = None;
        }

        self.reader.request_read();
        self.waiting_for_card = true;
        vec![AuthEvent::Message(AuthMessage::CardExpected)]
    }

    /// Nozzle returned (or the sale finished): stop waiting for a card.
    pub fn handle_nozzle_in_or_sale_finished(&mut self) -> Vec<AuthEvent> {
        self.reader.cancel_read();
        self.waiting_for_card = false;
        vec![AuthEvent::Message(AuthMessage::Idle)]
    }

    /// One reader polling pass, translating whatever the reader saw.
    pub fn poll_once(&mut self, now_ms: u64) -> Vec<AuthEvent> {
        match self.reader.poll_once() {
            Some(ReaderEvent::CardDetected(card)) => self.handle_card(card, now_ms),
            Some(ReaderEvent::Failure(msg)) => self.handle_failure(msg),
            None => Vec::new(),
        }
    }

    fn handle_card(&mut self, card: CardEvent, now_ms: u64) -> Vec<AuthEvent> {
        // Only reads the pump actually asked for (nozzle-out flow) drive the
        // user-facing messages; stray reads still produce a result for the
        // log layers.
        let gui_flow = self.waiting_for_card;
        self.waiting_for_card = false;

        info!("card detected, raw uid={}", card.uid_hex);

        let ctx = match self.users.find_by_uid(&card.uid_hex) {
            Some(user) => AuthContext {
                authorized: true,
                uid_hex: card.uid_hex.clone(),
                user_id: user.user_id.to_string(),
                plate: user.plate.clone(),
                limit_liters: user.limit_liters,
            },
            None => {
                info!("uid not found in user directory");
                AuthContext {
                    authorized: false,
                    uid_hex: card.uid_hex.clone(),
                    ..AuthContext::default()
                }
            }
        };

        let authorized = ctx.authorized;
        let mut events = vec![AuthEvent::Result(ctx)];

        if gui_flow {
            events.push(AuthEvent::Message(if authorized {
                AuthMessage::AuthorizedUser
            } else {
                AuthMessage::UnauthorizedUser
            }));
        }

        if authorized {
            events.push(AuthEvent::AuthorizePump);
            if gui_flow {
                events.push(AuthEvent::Message(AuthMessage::PumpAuthorized));
            }
            self.cooldown_until_ms = Some(now_ms + AUTH_COOLDOWN_MS);
        }

        events
    }

    fn handle_failure(&mut self, msg: String) -> Vec<AuthEvent> {
        warn!("reader failure: {}", msg);
        self.waiting_for_card = false;
        vec![
            AuthEvent::Error(msg),
            AuthEvent::Message(AuthMessage::ReaderFailure),
        ]
    }
}
