//! Client Session: macchina a stati per la conversazione aperta.
//!
//! Unisce tre sorgenti nella stessa [`ClientViewState`]: lo storico caricato,
//! l'eco ottimistica degli invii locali e gli eventi ricevuti sul canale live
//! dell'utente. Il canale è per destinatario, quindi il mittente non riceve mai
//! il push del proprio messaggio: l'eco ottimistica viene sostituita dalla copia
//! restituita dall'invio.

use missiva_core::{new_client_msg_id, now_utc, ChatError, DeliveryEvent, Message};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    backend::{ChatBackend, PushFeed},
    view::{ClientViewState, ViewEntry},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Loading,
    Ready,
}

/// Invio in corso: generato da [`ClientSession::begin_send`], chiuso da
/// [`ClientSession::complete_send`].
#[derive(Debug, Clone)]
pub struct PendingSend {
    pub client_msg_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub attachment: Option<String>,
    epoch: u64,
}

impl PendingSend {
    /// Esegue l'invio vero e proprio. Non dipende dalla sessione, così può
    /// completarsi anche se nel frattempo la conversazione è stata chiusa.
    pub async fn dispatch<B: ChatBackend + ?Sized>(&self, backend: &B) -> Result<Message, ChatError> {
        backend
            .send(
                &self.sender_id,
                &self.receiver_id,
                &self.content,
                self.attachment.as_deref(),
            )
            .await
    }
}

pub struct ClientSession<B: ChatBackend> {
    backend: Arc<B>,
    user_id: String,
    peer_id: Option<String>,
    state: SessionState,
    view: ClientViewState,
    feed: Option<PushFeed>,
    // cambia a ogni open/close: gli invii di una conversazione precedente non toccano la vista
    epoch: u64,
}

impl<B: ChatBackend> ClientSession<B> {
    pub fn new(backend: Arc<B>, user_id: impl Into<String>) -> Self {
        Self {
            backend,
            user_id: user_id.into(),
            peer_id: None,
            state: SessionState::Idle,
            view: ClientViewState::new(),
            feed: None,
            epoch: 0,
        }
    }

    pub fn backend(&self) -> Arc<B> {
        self.backend.clone()
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn peer_id(&self) -> Option<&str> {
        self.peer_id.as_deref()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn view(&self) -> &ClientViewState {
        &self.view
    }

    pub fn is_live(&self) -> bool {
        self.feed.is_some()
    }

    /// Apre la conversazione con `peer_id`, scartando quella corrente.
    ///
    /// Il feed viene aperto prima di caricare lo storico: gli eventi arrivati
    /// durante il caricamento restano in coda e sono applicati (con dedup per
    /// id) appena lo storico è in vista. Se il caricamento fallisce la sessione
    /// torna `Idle` senza mostrare storico parziale.
    pub async fn open(&mut self, peer_id: &str) -> Result<(), ChatError> {
        self.close().await;
        self.peer_id = Some(peer_id.to_string());
        self.state = SessionState::Loading;

        // senza push la conversazione resta utilizzabile, solo non live
        let feed = match self.backend.subscribe(&self.user_id).await {
            Ok(feed) => Some(feed),
            Err(e) => {
                warn!(user = %self.user_id, error = %e, "live feed unavailable");
                None
            }
        };

        match self.backend.load(&self.user_id, peer_id).await {
            Ok(history) => {
                self.view.seed(history);
                self.feed = feed;
                self.state = SessionState::Ready;
                self.sync_pushes();
                Ok(())
            }
            Err(e) => {
                if let Some(feed) = feed {
                    self.backend.unsubscribe(feed).await;
                }
                self.peer_id = None;
                self.state = SessionState::Idle;
                Err(e)
            }
        }
    }

    /// Chiude la conversazione: rilascia il feed e scarta la vista.
    /// Gli invii già partiti non vengono annullati.
    pub async fn close(&mut self) {
        if let Some(feed) = self.feed.take() {
            self.backend.unsubscribe(feed).await;
        }
        self.view.clear();
        self.peer_id = None;
        self.state = SessionState::Idle;
        self.epoch += 1;
    }

    /// Applica un evento ricevuto. Restituisce `true` se la vista è cambiata.
    pub fn apply_push(&mut self, event: DeliveryEvent) -> bool {
        if self.state != SessionState::Ready {
            return false;
        }
        let Some(peer) = self.peer_id.as_deref() else {
            return false;
        };
        if !event.message.involves(peer) {
            debug!(message_id = %event.message.id, "push for another conversation, ignored");
            return false;
        }
        self.view.insert(ViewEntry::pushed(event.message))
    }

    /// Applica tutti gli eventi già in coda, senza attendere. Restituisce quanti
    /// hanno modificato la vista.
    pub fn sync_pushes(&mut self) -> usize {
        let mut applied = 0;
        while let Some(event) = self.feed.as_mut().and_then(PushFeed::try_recv) {
            if self.apply_push(event) {
                applied += 1;
            }
        }
        applied
    }

    /// Attende il prossimo evento e lo applica. `None` se non c'è un feed o se è stato chiuso;
    /// un feed chiuso dal trasporto viene rilasciato e la sessione smette di essere live.
    pub async fn next_push(&mut self) -> Option<bool> {
        let next = self.feed.as_mut()?.recv().await;
        match next {
            Some(event) => Some(self.apply_push(event)),
            None => {
                if let Some(feed) = self.feed.take() {
                    warn!(user = %self.user_id, "live feed closed by transport");
                    self.backend.unsubscribe(feed).await;
                }
                None
            }
        }
    }

    /// Mostra subito l'invio con una voce ottimistica e restituisce il ticket
    /// da passare a [`complete_send`](Self::complete_send).
    pub fn begin_send(
        &mut self,
        content: &str,
        attachment: Option<&str>,
    ) -> Result<PendingSend, ChatError> {
        let attachment = attachment.filter(|url| !url.is_empty());
        if content.trim().is_empty() && attachment.is_none() {
            return Err(ChatError::validation("empty content"));
        }
        let (SessionState::Ready, Some(peer)) = (self.state, self.peer_id.as_deref()) else {
            return Err(ChatError::validation("no conversation open"));
        };

        let pending = PendingSend {
            client_msg_id: new_client_msg_id(),
            sender_id: self.user_id.clone(),
            receiver_id: peer.to_string(),
            content: content.to_string(),
            attachment: attachment.map(str::to_string),
            epoch: self.epoch,
        };
        self.view.insert(ViewEntry::optimistic(
            pending.client_msg_id.clone(),
            &pending.sender_id,
            &pending.receiver_id,
            &pending.content,
            pending.attachment.as_deref(),
            now_utc(),
        ));
        Ok(pending)
    }

    /// Riconcilia l'esito di un invio con la vista.
    ///
    /// Successo: il segnaposto è sostituito dalla copia del server. Errore: il
    /// segnaposto sparisce e l'errore torna al chiamante. Se la conversazione
    /// nel frattempo è cambiata la vista non viene toccata.
    pub fn complete_send(
        &mut self,
        pending: PendingSend,
        outcome: Result<Message, ChatError>,
    ) -> Result<Message, ChatError> {
        if pending.epoch != self.epoch {
            debug!(client_msg_id = %pending.client_msg_id, "send completed after conversation change");
            return outcome;
        }
        match outcome {
            Ok(message) => {
                self.view.confirm(&pending.client_msg_id, message.clone());
                Ok(message)
            }
            Err(e) => {
                self.view.discard(&pending.client_msg_id);
                Err(e)
            }
        }
    }

    /// Invio completo: eco ottimistica, invio, riconciliazione.
    pub async fn send(
        &mut self,
        content: &str,
        attachment: Option<&str>,
    ) -> Result<Message, ChatError> {
        let pending = self.begin_send(content, attachment)?;
        let outcome = pending.dispatch(self.backend.as_ref()).await;
        self.complete_send(pending, outcome)
    }
}
