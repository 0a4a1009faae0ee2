//! The conference orchestrator.
//!
//! A [`Conference`] joins several point-to-point calls into one mixed
//! audio/video session. It owns the participant and moderation state, the
//! mixer handles, the host media slots and the authoritative layout
//! document, and drives every collaborator through handles injected at
//! construction.
//!
//! Handling of the local host mute state: when a call joins, its media
//! source becomes the mixer output and the host capture devices feed the
//! mixer. The mixers themselves are never muted - they emit silence or
//! black frames when every feeding source is muted. The host source mute
//! flag therefore starts as the AND of the joining calls' mute flags and
//! is owned by the conference from then on.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::broadcast::Broadcaster;
use super::order::ConfOrder;
use super::registry::ParticipantRegistry;
use crate::account::Account;
use crate::audio::{AudioBinder, HostAudioState, RingBufferGuard, RingBufferPool};
use crate::call::{Call, CallRegistry};
use crate::errors::{ConferenceError, Result};
use crate::events::ConferenceSignal;
use crate::layout::{ConfInfo, ConfLayout, MergeOutcome};
use crate::media::{HostMediaSources, MediaAttribute, MediaMap, MediaType};
use crate::recorder::{Recorder, AUDIO_MIXER_STREAM, VIDEO_MIXER_STREAM};
use crate::types::{strip_device_suffix, CallId, ConfId, HOST_PEER_ID};
use crate::video::{
    HostRowContext, RowStatus, SinkClient, SinkFactory, SourceInfo, VideoMixerFactory, VideoRouter,
};

/// Lifecycle state of a conference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConferenceState {
    /// The local host feeds and hears the mix.
    ActiveAttached,
    /// The conference runs without the local host's media.
    ActiveDetached,
    /// Terminal state; every operation is a no-op.
    Destroyed,
}

impl ConferenceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConferenceState::ActiveAttached => "ACTIVE_ATTACHED",
            ConferenceState::ActiveDetached => "ACTIVE_DETACHED",
            ConferenceState::Destroyed => "DESTROYED",
        }
    }
}

impl std::fmt::Display for ConferenceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collaborator handles and options for building a [`Conference`].
pub struct ConferenceBuilder {
    account: Arc<dyn Account>,
    calls: Arc<dyn CallRegistry>,
    pool: Arc<dyn RingBufferPool>,
    recorder: Arc<dyn Recorder>,
    mixer_factory: Option<Arc<dyn VideoMixerFactory>>,
    sink_factory: Option<Arc<dyn SinkFactory>>,
    id: Option<ConfId>,
}

impl ConferenceBuilder {
    pub fn new(
        account: Arc<dyn Account>,
        calls: Arc<dyn CallRegistry>,
        pool: Arc<dyn RingBufferPool>,
        recorder: Arc<dyn Recorder>,
    ) -> Self {
        Self {
            account,
            calls,
            pool,
            recorder,
            mixer_factory: None,
            sink_factory: None,
            id: None,
        }
    }

    /// Enable video through the given mixer and sink factories. Video still
    /// requires the account preference to be on.
    pub fn with_video(
        mut self,
        mixer_factory: Arc<dyn VideoMixerFactory>,
        sink_factory: Arc<dyn SinkFactory>,
    ) -> Self {
        self.mixer_factory = Some(mixer_factory);
        self.sink_factory = Some(sink_factory);
        self
    }

    /// Use a caller-assigned conference id.
    pub fn with_id(mut self, id: ConfId) -> Self {
        self.id = Some(id);
        self
    }

    /// Build the conference. Must run inside the tokio runtime: the
    /// broadcaster task and the layout-update task are spawned here.
    pub fn build(self) -> Arc<Conference> {
        let id = self.id.unwrap_or_default();
        let video_enabled = self.account.is_video_enabled() && self.mixer_factory.is_some();

        info!("Create new conference {id}");

        let mut host_sources = HostMediaSources::default();
        let default_video_uri = self
            .mixer_factory
            .as_ref()
            .map(|factory| factory.default_device_uri());
        host_sources.set_attached_defaults(if video_enabled {
            default_video_uri.as_deref()
        } else {
            None
        });

        let registry = Arc::new(ParticipantRegistry::new());
        let audio = AudioBinder::new(
            id.clone(),
            self.pool.clone(),
            registry.clone(),
            self.calls.clone(),
        );

        let video = if video_enabled {
            let factory = self.mixer_factory.as_ref().expect("video requires a mixer factory");
            let mixer = factory.create_mixer(&id, host_sources.video_uri());
            Some(VideoRouter::new(id.clone(), mixer, self.calls.clone()))
        } else {
            None
        };

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();

        let conference = Arc::new(Conference {
            id,
            account: Arc::downgrade(&self.account),
            video_enabled,
            state: Mutex::new(ConferenceState::ActiveAttached),
            registry,
            host_sources: Mutex::new(host_sources),
            audio,
            video,
            layout: Mutex::new(ConfLayout::default()),
            sinks: DashMap::new(),
            calls: self.calls,
            recorder: self.recorder,
            recording: AtomicBool::new(false),
            local_mod_added: AtomicBool::new(false),
            secondary_input: Mutex::new(String::new()),
            ghost_ring_buffer: Mutex::new(None),
            mixer_factory: self.mixer_factory,
            sink_factory: self.sink_factory,
            signal_tx,
            signal_rx: Mutex::new(Some(signal_rx)),
            broadcaster: Broadcaster::spawn(),
        });

        if let Some(router) = &conference.video {
            // Mixer callbacks are re-ordered onto a single task before they
            // touch the layout, so two source updates cannot interleave and
            // broadcasts stay FIFO with respect to recompositions.
            let (update_tx, mut update_rx) = mpsc::unbounded_channel::<Vec<SourceInfo>>();
            router.mixer().set_on_sources_updated(Box::new(move |infos| {
                let _ = update_tx.send(infos);
            }));

            let weak = Arc::downgrade(&conference);
            tokio::spawn(async move {
                while let Some(infos) = update_rx.recv().await {
                    let conference = match Weak::upgrade(&weak) {
                        Some(conference) => conference,
                        None => break,
                    };
                    conference.on_sources_updated(infos).await;
                }
            });
        }

        conference
    }
}

/// A running conference.
pub struct Conference {
    id: ConfId,
    account: Weak<dyn Account>,
    video_enabled: bool,
    state: Mutex<ConferenceState>,
    registry: Arc<ParticipantRegistry>,
    host_sources: Mutex<HostMediaSources>,
    audio: AudioBinder,
    video: Option<VideoRouter>,
    layout: Mutex<ConfLayout>,
    sinks: DashMap<String, Arc<dyn SinkClient>>,
    calls: Arc<dyn CallRegistry>,
    recorder: Arc<dyn Recorder>,
    recording: AtomicBool,
    local_mod_added: AtomicBool,
    secondary_input: Mutex<String>,
    ghost_ring_buffer: Mutex<Option<Box<dyn RingBufferGuard>>>,
    mixer_factory: Option<Arc<dyn VideoMixerFactory>>,
    sink_factory: Option<Arc<dyn SinkFactory>>,
    signal_tx: mpsc::UnboundedSender<ConferenceSignal>,
    signal_rx: Mutex<Option<mpsc::UnboundedReceiver<ConferenceSignal>>>,
    broadcaster: Broadcaster,
}

impl Conference {
    pub fn id(&self) -> &ConfId {
        &self.id
    }

    pub fn state(&self) -> ConferenceState {
        *self.state.lock().unwrap()
    }

    fn set_state(&self, state: ConferenceState) {
        let mut current = self.state.lock().unwrap();
        debug!("[conf {}] Set state to [{state}] (was [{current}])", self.id);
        *current = state;
    }

    pub fn is_video_enabled(&self) -> bool {
        self.video_enabled
    }

    /// The video router, when this conference mixes video.
    pub fn video_router(&self) -> Option<&VideoRouter> {
        self.video.as_ref()
    }

    /// The audio binder. The call manager binds a call here after adding it.
    pub fn audio_binder(&self) -> &AudioBinder {
        &self.audio
    }

    /// Audio state of the host as the binder needs it.
    pub fn host_audio(&self) -> HostAudioState {
        self.host_audio_state()
    }

    /// Client signal receiver; can only be taken once.
    pub fn take_signal_receiver(&self) -> Option<mpsc::UnboundedReceiver<ConferenceSignal>> {
        self.signal_rx.lock().unwrap().take()
    }

    /// Snapshot of the participant call ids.
    pub fn participants(&self) -> Vec<CallId> {
        self.registry.participants()
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    fn emit(&self, signal: ConferenceSignal) {
        let _ = self.signal_tx.send(signal);
    }

    fn get_call(&self, call_id: &CallId) -> Option<Arc<dyn Call>> {
        self.calls.get_call(call_id)
    }

    /// Resolve a stripped peer id to one of the participating calls.
    pub fn get_call_from_peer_id(&self, peer_id: &str) -> Option<Arc<dyn Call>> {
        for participant in self.registry.participants() {
            if let Some(call) = self.get_call(&participant) {
                if strip_device_suffix(&call.peer_uri()) == peer_id {
                    return Some(call);
                }
            }
        }
        None
    }

    /// Whether `uri` denotes the local host: the empty URI, the reserved
    /// `"host"` URI, or the username of any participating call's account
    /// (two local accounts may sit in the same conference on one device).
    pub fn is_host(&self, uri: &str) -> bool {
        if uri.is_empty() || uri == HOST_PEER_ID {
            return true;
        }
        for participant in self.registry.participants() {
            if let Some(call) = self.get_call(&participant) {
                if let Some(account) = call.account() {
                    if account.username() == uri {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Whether `uri` holds moderator rights. The host is a moderator by
    /// definition.
    pub fn is_moderator(&self, uri: &str) -> bool {
        self.registry.has_moderator(uri) || self.is_host(uri)
    }

    pub fn is_hand_raised(&self, uri: &str) -> bool {
        if self.is_host(uri) {
            self.registry.is_hand_raised(HOST_PEER_ID)
        } else {
            self.registry.is_hand_raised(uri)
        }
    }

    /// Whether a moderator muted `peer_id`.
    pub fn is_muted(&self, peer_id: &str) -> bool {
        self.registry.is_muted(peer_id)
    }

    /// Whether the host source for `media_type` is muted. A detached host
    /// always reads as muted.
    pub fn is_media_source_muted(&self, media_type: MediaType) -> bool {
        if self.state() != ConferenceState::ActiveAttached {
            return true;
        }
        self.host_sources.lock().unwrap().is_muted(media_type)
    }

    fn host_audio_state(&self) -> HostAudioState {
        if self.state() == ConferenceState::ActiveAttached {
            HostAudioState::Attached {
                muted: self.is_media_source_muted(MediaType::Audio),
            }
        } else {
            HostAudioState::Detached
        }
    }

    fn is_destroyed(&self, operation: &str) -> bool {
        if self.state() == ConferenceState::Destroyed {
            warn!("[conf {}] Ignoring {operation} on destroyed conference", self.id);
            return true;
        }
        false
    }

    // ---- participant lifecycle -------------------------------------------

    /// Add a call to the conference. A call already present is a no-op.
    pub async fn add_participant(&self, call_id: &CallId) {
        if self.is_destroyed("add_participant") {
            return;
        }
        debug!("Adding call {call_id} to conference {}", self.id);

        if !self.registry.add_participant(call_id.clone()) {
            return;
        }

        if let Some(call) = self.get_call(call_id) {
            // A peer muted before the conference stays moderator-muted in it.
            if call.is_peer_muted() {
                self.registry
                    .set_muted(strip_device_suffix(&call.peer_uri()), true);
            }
            self.take_over_media_source_control(call_id).await;
        }

        if let Some(call) = self.get_call(call_id) {
            if let Some(account) = call.account() {
                for moderator in account.default_moderators() {
                    self.registry.add_moderator(moderator);
                }
                if account.local_moderators_enabled()
                    && !self.local_mod_added.swap(true, Ordering::SeqCst)
                {
                    for username in self.calls.local_usernames() {
                        self.registry.add_moderator(username);
                    }
                }
                if account.all_moderators_enabled() {
                    self.registry
                        .add_moderator(strip_device_suffix(&call.peer_uri()));
                }
            }
        }

        if let Some(call) = self.get_call(call_id) {
            // Every participant needs a video session with a sink to show up
            // in the layout, so audio-only calls get a placeholder stream.
            if self.video_enabled
                && !MediaAttribute::has_media_type(&call.media_attributes(), MediaType::Video)
            {
                call.add_dummy_video_session().await;
            }
            call.enter_conference(&self.id).await;

            if call.is_recording() {
                debug!("Stop recording for call {call_id}");
                call.toggle_recording().await;
                if !self.is_recording() {
                    debug!(
                        "One participant was recording, start recording for conference {}",
                        self.id
                    );
                    self.toggle_recording().await;
                }
            }
        } else {
            error!("No call associated to participant {call_id}");
        }
    }

    /// Remove a call from the conference. An absent call is a no-op.
    pub async fn remove_participant(&self, call_id: &CallId) {
        if !self.registry.remove_participant(call_id) {
            return;
        }
        if let Some(call) = self.get_call(call_id) {
            let peer_id = strip_device_suffix(&call.peer_uri()).to_string();
            self.registry.set_muted(&peer_id, false);
            self.registry.set_hand_raised(&peer_id, false);
            call.exit_conference().await;
            if call.is_peer_recording() {
                call.peer_recording(false).await;
            }
        }
    }

    /// Inherit the mute state of a joining call's sources and hand mute
    /// control to the mixer.
    ///
    /// The host source is muted only while every feeding source is muted:
    /// the first participant seeds the state, later ones AND into it. The
    /// call's own mute flag is then forced off - the conference owns mute
    /// semantics from here on.
    async fn take_over_media_source_control(&self, call_id: &CallId) {
        let call = match self.get_call(call_id) {
            Some(call) => call,
            None => {
                error!("No call matches participant {call_id}");
                return;
            }
        };
        if call.account().is_none() {
            error!("No account detected for call {call_id}");
            return;
        }

        let mut media_list = call.media_attributes();

        for media_type in [MediaType::Audio, MediaType::Video] {
            let attr = media_list.iter_mut().find(|attr| {
                attr.media_type == media_type
                    && attr.source_type != crate::media::MediaSourceType::None
            });
            let attr = match attr {
                Some(attr) => attr,
                None => {
                    debug!("[call {call_id}] Does not have an active [{media_type}] media source");
                    continue;
                }
            };

            if self.state() == ConferenceState::ActiveAttached {
                let muted = if self.registry.participant_count() == 1 {
                    attr.muted
                } else {
                    attr.muted && self.is_media_source_muted(media_type)
                };
                self.host_sources.lock().unwrap().set_muted(media_type, muted);
            }

            attr.muted = false;
        }

        call.request_media_change(MediaAttribute::to_media_maps(&media_list))
            .await;

        for media_type in [MediaType::Audio, MediaType::Video] {
            let muted = self.is_media_source_muted(media_type);
            warn!(
                "Take over [{media_type}] control from call {call_id} - current local source state [{}]",
                if muted { "muted" } else { "un-muted" }
            );
            match media_type {
                MediaType::Audio => self.emit(ConferenceSignal::AudioMuted {
                    conf_id: self.id.clone(),
                    muted,
                }),
                _ => self.emit(ConferenceSignal::VideoMuted {
                    conf_id: self.id.clone(),
                    muted,
                }),
            }
        }
    }

    // ---- host attachment -------------------------------------------------

    /// Attach the local host. Legal only while detached.
    pub async fn attach_local_participant(&self) {
        info!("Attach local participant to conference {}", self.id);

        if self.state() != ConferenceState::ActiveDetached {
            warn!(
                "Invalid conference state in attach participant: current \"{}\" - expected \"{}\"",
                self.state(),
                ConferenceState::ActiveDetached
            );
            return;
        }

        self.set_state(ConferenceState::ActiveAttached);
        {
            let default_video_uri = self
                .mixer_factory
                .as_ref()
                .map(|factory| factory.default_device_uri());
            self.host_sources.lock().unwrap().set_attached_defaults(
                if self.video_enabled {
                    default_video_uri.as_deref()
                } else {
                    None
                },
            );
        }

        self.audio.attach_host();

        if let Some(router) = &self.video {
            let video_uri = self.host_sources.lock().unwrap().video_uri().to_string();
            router.mixer().switch_input(&video_uri);
            let secondary = self.secondary_input.lock().unwrap().clone();
            if !secondary.is_empty() {
                router.mixer().switch_secondary_input(&secondary);
            }
        }
    }

    /// Detach the local host. Legal only while attached.
    pub async fn detach_local_participant(&self) {
        info!("Detach local participant from conference {}", self.id);

        if self.state() != ConferenceState::ActiveAttached {
            warn!(
                "Invalid conference state in detach participant: current \"{}\" - expected \"{}\"",
                self.state(),
                ConferenceState::ActiveAttached
            );
            return;
        }

        self.audio.detach_host();

        if let Some(router) = &self.video {
            router.mixer().stop_input();
        }

        self.set_state(ConferenceState::ActiveDetached);
        self.host_sources.lock().unwrap().clear();
    }

    // ---- host media ------------------------------------------------------

    /// Change the host media sources. Legal only while attached; at most
    /// one stream per media type; source URIs may only change for video.
    pub async fn request_media_change(&self, media_list: Vec<MediaMap>) -> Result<()> {
        if self.state() != ConferenceState::ActiveAttached {
            error!(
                "[conf {}] Request media change can be performed only in attached mode",
                self.id
            );
            return Err(ConferenceError::invalid_state(
                "media change requires an attached host",
            ));
        }

        debug!("[conf {}] Request media change", self.id);

        let attrs = MediaAttribute::from_media_maps(&media_list);
        for attr in &attrs {
            debug!("[conf {}] New requested media: {}", self.id, attr.describe(true));
        }

        for media_type in [MediaType::Audio, MediaType::Video] {
            let count = attrs.iter().filter(|attr| attr.media_type == media_type).count();
            if count > 1 {
                error!(
                    "[conf {}] Can't handle more than 1 stream per media type (found {count})",
                    self.id
                );
                return Err(ConferenceError::invalid_media_request(
                    "more than one stream per media type",
                ));
            }
        }

        for attr in &attrs {
            if attr.media_type == MediaType::None {
                warn!("[conf {}] Ignoring media with unset type", self.id);
                continue;
            }

            let (slot_uri, slot_muted) = {
                let sources = self.host_sources.lock().unwrap();
                let slot = sources.slot(attr.media_type).expect("audio/video slot");
                (slot.source_uri.clone(), slot.muted)
            };

            if !attr.source_uri.is_empty() && slot_uri != attr.source_uri {
                // Only the video source may be switched by the client.
                if attr.media_type != MediaType::Video {
                    error!("[conf {}] Media source can be changed only for video", self.id);
                    return Err(ConferenceError::invalid_media_request(
                        "source change is video-only",
                    ));
                }

                {
                    let mut sources = self.host_sources.lock().unwrap();
                    if let Some(slot) = sources.slot_mut(MediaType::Video) {
                        slot.source_uri = attr.source_uri.clone();
                        slot.source_type = attr.source_type;
                    }
                }

                if slot_muted != attr.muted {
                    // Un-muting installs the new source as mixer input.
                    self.mute_local_host(attr.muted, attr.media_type).await;
                } else {
                    self.switch_input(&attr.source_uri);
                }
            }

            let slot_muted = {
                let sources = self.host_sources.lock().unwrap();
                sources.slot(attr.media_type).map(|slot| slot.muted).unwrap_or(true)
            };
            if slot_muted != attr.muted {
                self.mute_local_host(attr.muted, attr.media_type).await;
            }
        }

        Ok(())
    }

    /// Answer a peer's media-change request while it sits in the conference.
    pub async fn handle_media_change_request(
        &self,
        call: &Arc<dyn Call>,
        remote_media_list: Vec<MediaMap>,
    ) {
        debug!("[conf {}] Answer to media change request", self.id);

        if self.video_enabled
            && MediaAttribute::has_media_type(
                &MediaAttribute::from_media_maps(&remote_media_list),
                MediaType::Video,
            )
        {
            call.remove_dummy_video_sessions().await;
        }

        // Decided before the media changes under us.
        let update_mixer = call.check_media_change_request(&remote_media_list);

        // In a conference every newly added media is accepted, so the answer
        // is the call's current list extended by any additional remote entry.
        let mut new_media_list: Vec<MediaMap> =
            MediaAttribute::to_media_maps(&call.media_attributes());
        if remote_media_list.len() > new_media_list.len() {
            new_media_list.extend(remote_media_list.into_iter().skip(new_media_list.len()));
        }

        call.answer_media_change_request(new_media_list).await;
        call.enter_conference(&self.id).await;

        if update_mixer && self.state() == ConferenceState::ActiveAttached {
            self.detach_local_participant().await;
            self.attach_local_participant().await;
        }
    }

    /// Mute or unmute the local host source of one media type. Idempotent.
    pub async fn mute_local_host(&self, muted: bool, media_type: MediaType) {
        if self.is_destroyed("mute_local_host") {
            return;
        }
        match media_type {
            MediaType::Audio => {
                if muted == self.is_media_source_muted(MediaType::Audio) {
                    debug!(
                        "Local audio source already in [{}] state",
                        if muted { "muted" } else { "un-muted" }
                    );
                    return;
                }

                let host_moderator_muted = self.registry.is_muted(HOST_PEER_ID);
                if muted && !self.is_media_source_muted(MediaType::Audio) && !host_moderator_muted {
                    debug!("Muting local audio source");
                    self.audio.unbind_host();
                } else if !muted
                    && self.is_media_source_muted(MediaType::Audio)
                    && !host_moderator_muted
                {
                    debug!("Un-muting local audio source");
                    self.audio.bind_host();
                }
                self.host_sources
                    .lock()
                    .unwrap()
                    .set_muted(MediaType::Audio, muted);
                self.update_muted().await;
                self.emit(ConferenceSignal::AudioMuted {
                    conf_id: self.id.clone(),
                    muted,
                });
            }
            MediaType::Video => {
                if !self.video_enabled {
                    error!("Can't mute, the video is disabled");
                    return;
                }
                if muted == self.is_media_source_muted(MediaType::Video) {
                    debug!(
                        "Local video source already in [{}] state",
                        if muted { "muted" } else { "un-muted" }
                    );
                    return;
                }
                self.host_sources
                    .lock()
                    .unwrap()
                    .set_muted(MediaType::Video, muted);
                if let Some(router) = &self.video {
                    if muted {
                        debug!("Muting local video source");
                        router.mixer().stop_input();
                    } else {
                        debug!("Un-muting local video source");
                        let uri = self.host_sources.lock().unwrap().video_uri().to_string();
                        self.switch_input(&uri);
                    }
                }
                self.emit(ConferenceSignal::VideoMuted {
                    conf_id: self.id.clone(),
                    muted,
                });
            }
            MediaType::None => warn!("Unsupported media type"),
        }
    }

    /// Switch the host video input.
    pub fn switch_input(&self, uri: &str) {
        debug!("[conf {}] Setting video input to {uri}", self.id);
        if let Some(slot) = self.host_sources.lock().unwrap().slot_mut(MediaType::Video) {
            slot.source_uri = uri.to_string();
        }
        if !self.video_enabled {
            return;
        }
        if let Some(router) = &self.video {
            router.mixer().switch_input(uri);
        }
    }

    /// Switch the secondary host input (screen share).
    pub fn switch_secondary_input(&self, uri: &str) {
        *self.secondary_input.lock().unwrap() = uri.to_string();
        if let Some(router) = &self.video {
            router.mixer().switch_secondary_input(uri);
        }
    }

    // ---- moderation ------------------------------------------------------

    /// Moderator-mute a participant, the host, or a nested participant.
    ///
    /// Orders for participants of a remote sub-host are forwarded to that
    /// host; the mute state would otherwise be lost in the merge, since
    /// remote rows are never echoed back to their owner.
    pub async fn mute_participant(&self, peer_id: &str, state: bool) {
        if self.is_destroyed("mute_participant") {
            return;
        }

        let remote_host = self.layout.lock().unwrap().find_host_for_remote(peer_id);
        if let Some(remote_host) = remote_host {
            if let Some(call) = self.get_call_from_peer_id(strip_device_suffix(&remote_host)) {
                call.send_conf_order(ConfOrder::mute(peer_id, state)).await;
                return;
            }
        }

        if self.is_host(peer_id) {
            let host_muted = self.registry.is_muted(HOST_PEER_ID);
            if state && !host_muted {
                self.registry.set_muted(HOST_PEER_ID, true);
                if !self.is_media_source_muted(MediaType::Audio) {
                    debug!("Mute host");
                    self.audio.unbind_host();
                }
            } else if !state && host_muted {
                self.registry.set_muted(HOST_PEER_ID, false);
                if !self.is_media_source_muted(MediaType::Audio) {
                    debug!("Unmute host");
                    self.audio.bind_host();
                }
            }
            self.update_muted().await;
            return;
        }

        if let Some(call) = self.get_call_from_peer_id(peer_id) {
            let participant_muted = self.registry.is_muted(peer_id);
            if state && !participant_muted {
                debug!("Mute participant {peer_id}");
                self.registry.set_muted(peer_id, true);
                self.audio.unbind_participant(&call.id());
                self.update_muted().await;
            } else if !state && participant_muted {
                debug!("Unmute participant {peer_id}");
                self.registry.set_muted(peer_id, false);
                self.audio
                    .bind_participant(call.id().as_str(), self.host_audio_state());
                self.update_muted().await;
            }
        }
    }

    /// Raise or lower a hand. The host uses the reserved `"host"` key.
    pub async fn set_hand_raised(&self, peer_id: &str, state: bool) {
        if self.is_host(peer_id) {
            let raised = self.registry.is_hand_raised(HOST_PEER_ID);
            if state && !raised {
                debug!("Raise host hand");
                self.registry.set_hand_raised(HOST_PEER_ID, true);
                self.update_hands_raised().await;
            } else if !state && raised {
                debug!("Lower host hand");
                self.registry.set_hand_raised(HOST_PEER_ID, false);
                self.update_hands_raised().await;
            }
            return;
        }

        for participant in self.registry.participants() {
            if let Some(call) = self.get_call(&participant) {
                let raised = self.is_hand_raised(peer_id);
                if peer_id == strip_device_suffix(&call.peer_uri()) {
                    if state && !raised {
                        debug!("Raise {peer_id} hand");
                        self.registry.set_hand_raised(peer_id, true);
                        self.update_hands_raised().await;
                    } else if !state && raised {
                        debug!("Remove {peer_id} raised hand");
                        self.registry.set_hand_raised(peer_id, false);
                        self.update_hands_raised().await;
                    }
                    return;
                }
            }
        }
        warn!("Fail to raise {peer_id} hand (participant not found)");
    }

    /// Grant or revoke moderator rights for a participating peer.
    pub async fn set_moderator(&self, peer_id: &str, state: bool) {
        for participant in self.registry.participants() {
            if let Some(call) = self.get_call(&participant) {
                let moderator = self.is_moderator(peer_id);
                if peer_id == strip_device_suffix(&call.peer_uri()) {
                    if state && !moderator {
                        debug!("Add {peer_id} as moderator");
                        self.registry.add_moderator(peer_id);
                        self.update_moderators().await;
                    } else if !state && moderator {
                        debug!("Remove {peer_id} as moderator");
                        self.registry.remove_moderator(peer_id);
                        self.update_moderators().await;
                    }
                    return;
                }
            }
        }
        warn!("Fail to set {peer_id} as moderator (participant not found)");
    }

    /// Emphasise a participant in the mixer layout.
    pub fn set_active_participant(&self, peer_id: &str) {
        let router = match &self.video {
            Some(router) => router,
            None => return,
        };
        if self.is_host(peer_id) {
            router.set_active_host();
            return;
        }
        if let Some(call) = self.get_call_from_peer_id(peer_id) {
            if let Some(key) = call.receive_video_source() {
                router.set_active_source(Some(key));
            }
            return;
        }

        let remote_host = self.layout.lock().unwrap().find_host_for_remote(peer_id);
        if remote_host.is_some() {
            // Emphasis inside a nested conference is the remote host's call.
            warn!("Change remote layout is not supported");
            return;
        }

        router.set_active_source(None);
    }

    /// Apply a numeric layout order.
    pub fn set_layout(&self, layout: u32) {
        if let Some(router) = &self.video {
            router.set_layout(layout);
        }
    }

    /// Hang up a participant: the host detaches, a local call is hung up
    /// through the call manager, a nested participant's order is forwarded.
    pub async fn hangup_participant(&self, peer_id: &str) {
        if self.is_destroyed("hangup_participant") {
            return;
        }

        if self.is_host(peer_id) {
            self.detach_local_participant().await;
            return;
        }

        if let Some(call) = self.get_call_from_peer_id(peer_id) {
            if let Some(account) = call.account() {
                self.calls.hangup_call(&account.id(), &call.id()).await;
            }
            return;
        }

        let remote_host = self.layout.lock().unwrap().find_host_for_remote(peer_id);
        let remote_host = match remote_host {
            Some(remote_host) => remote_host,
            None => {
                warn!("Can't hangup {peer_id}, peer not found");
                return;
            }
        };
        if let Some(call) = self.get_call_from_peer_id(strip_device_suffix(&remote_host)) {
            call.send_conf_order(ConfOrder::hangup(peer_id)).await;
        }
    }

    // ---- recording -------------------------------------------------------

    /// Flip conference recording; every participant is notified of the new
    /// state. Returns the new state.
    pub async fn toggle_recording(&self) -> bool {
        let new_state = !self.is_recording();
        if new_state {
            self.init_recorder();
        } else {
            self.deinit_recorder();
        }

        for participant in self.registry.participants() {
            if let Some(call) = self.get_call(&participant) {
                call.update_record_state(new_state).await;
            }
        }

        self.recording.store(new_state, Ordering::SeqCst);
        info!(
            "[conf {}] Recording {}",
            self.id,
            if new_state { "started" } else { "stopped" }
        );
        new_state
    }

    fn init_recorder(&self) {
        if self.video.is_some() {
            let _ = self.recorder.add_stream(VIDEO_MIXER_STREAM);
        }

        // A ghost ring buffer named after the conference receives the full
        // mix; binding it like a participant wires every edge.
        let guard = self.audio.pool().create_ring_buffer(self.id.as_str());
        *self.ghost_ring_buffer.lock().unwrap() = Some(guard);
        self.audio
            .bind_participant(self.id.as_str(), self.host_audio_state());

        let _ = self.recorder.add_stream(AUDIO_MIXER_STREAM);
    }

    fn deinit_recorder(&self) {
        if self.video.is_some() {
            self.recorder.detach_stream(VIDEO_MIXER_STREAM);
        }
        self.recorder.detach_stream(AUDIO_MIXER_STREAM);
        self.audio.pool().unbind_all(self.id.as_str());
        *self.ghost_ring_buffer.lock().unwrap() = None;
    }

    // ---- conf-order protocol ---------------------------------------------

    /// Process a conf-order JSON document received from a peer call.
    ///
    /// A peer may always change its own hand state; everything else
    /// requires moderator rights. Failures are logged and dropped.
    pub async fn on_conf_order(&self, call_id: &CallId, payload: &str) {
        if self.is_destroyed("on_conf_order") {
            return;
        }
        let call = match self.get_call(call_id) {
            Some(call) => call,
            None => return,
        };
        let peer_id = strip_device_suffix(&call.peer_uri()).to_string();

        let order = match ConfOrder::parse(payload) {
            Ok(order) => order,
            Err(_) => {
                warn!("Couldn't parse conference order from {peer_id}");
                return;
            }
        };

        // Hand state is handled before the moderator gate: any peer may
        // change its own hand, a moderator may lower someone else's.
        if let Some((uri, state)) = &order.hand_raised {
            if peer_id == *uri {
                self.set_hand_raised(uri, *state).await;
            } else if !state && self.is_moderator(&peer_id) {
                self.set_hand_raised(uri, *state).await;
            }
        }

        if !self.is_moderator(&peer_id) {
            warn!("Received conference order from a non master ({peer_id})");
            return;
        }

        if self.video_enabled {
            if let Some(layout) = order.layout {
                self.set_layout(layout);
            }
        }
        if let Some(uri) = &order.active_participant {
            self.set_active_participant(uri);
        }
        if let Some((uri, state)) = &order.mute_participant {
            self.mute_participant(uri, *state).await;
        }
        if let Some(uri) = &order.hangup_participant {
            self.hangup_participant(uri).await;
        }
    }

    // ---- layout ----------------------------------------------------------

    /// Merge a layout received from a remote sub-host.
    pub async fn merge_conf_info(&self, peer_uri: &str, new_info: ConfInfo) {
        if self.is_destroyed("merge_conf_info") {
            return;
        }

        // Fallback frame size for a zero canvas, from the remote call.
        let fallback_dims = self
            .get_call_from_peer_id(strip_device_suffix(peer_uri))
            .map(|call| call.decoded_frame_size())
            .unwrap_or((0, 0));

        let outcome = self
            .layout
            .lock()
            .unwrap()
            .merge_remote(peer_uri, new_info, fallback_dims);

        match outcome {
            MergeOutcome::Removed => self.send_conference_infos().await,
            MergeOutcome::Updated => {
                if let Some(router) = &self.video {
                    // Sub-tile resolutions may have changed; recomposing the
                    // mixer re-derives and rebroadcasts the layout.
                    router.mixer().update_layout();
                }
            }
            MergeOutcome::Unchanged | MergeOutcome::Aborted => {}
        }
    }

    /// Serialized handler for mixer source updates.
    pub(crate) async fn on_sources_updated(&self, infos: Vec<SourceInfo>) {
        let router = match &self.video {
            Some(router) => router,
            None => return,
        };
        let account = match self.account.upgrade() {
            Some(account) => account,
            None => return,
        };

        let host = HostRowContext {
            device_id: account.current_device_id(),
            audio_muted: self.is_media_source_muted(MediaType::Audio),
        };
        let new_info = router.derive_layout(&infos, &host, |peer_id| RowStatus {
            is_moderator: self.is_moderator(peer_id),
            is_hand_raised: self.is_hand_raised(peer_id),
            is_moderator_muted: self.is_muted(peer_id),
        });

        self.update_conference_info(new_info).await;
    }

    async fn update_conference_info(&self, info: ConfInfo) {
        self.layout.lock().unwrap().set_local(info);
        self.send_conference_infos().await;
    }

    /// Rewrite the mute flags of every stored row, then rebroadcast.
    async fn update_muted(&self) {
        let host_local_muted = self.is_media_source_muted(MediaType::Audio);
        // Collaborator lookups happen before the layout lock.
        let peer_muted: Vec<(String, bool)> = self
            .registry
            .participants()
            .iter()
            .filter_map(|id| self.get_call(id))
            .map(|call| {
                let peer = strip_device_suffix(&call.peer_uri()).to_string();
                (peer, call.is_peer_muted())
            })
            .collect();

        {
            let mut layout = self.layout.lock().unwrap();
            for row in &mut layout.local.participants {
                let peer_id = strip_device_suffix(&row.uri).to_string();
                if peer_id.is_empty() {
                    row.audio_moderator_muted = self.registry.is_muted(HOST_PEER_ID);
                    row.audio_local_muted = host_local_muted;
                } else {
                    row.audio_moderator_muted = self.registry.is_muted(&peer_id);
                    if let Some((_, muted)) = peer_muted.iter().find(|(peer, _)| *peer == peer_id) {
                        row.audio_local_muted = *muted;
                    }
                }
            }
        }
        self.send_conference_infos().await;
    }

    /// Rewrite the moderator flag of every stored row, then rebroadcast.
    async fn update_moderators(&self) {
        let host_uris = self.local_account_usernames();
        {
            let mut layout = self.layout.lock().unwrap();
            for row in &mut layout.local.participants {
                let peer_id = strip_device_suffix(&row.uri);
                row.is_moderator = self.registry.has_moderator(peer_id)
                    || peer_id.is_empty()
                    || host_uris.iter().any(|uri| uri == peer_id);
            }
        }
        self.send_conference_infos().await;
    }

    /// Rewrite the hand-raised flag of every stored row, then rebroadcast.
    async fn update_hands_raised(&self) {
        let host_uris = self.local_account_usernames();
        {
            let mut layout = self.layout.lock().unwrap();
            for row in &mut layout.local.participants {
                let peer_id = strip_device_suffix(&row.uri);
                let key = if peer_id.is_empty() || host_uris.iter().any(|uri| uri == peer_id) {
                    HOST_PEER_ID
                } else {
                    peer_id
                };
                row.hand_raised = self.registry.is_hand_raised(key);
            }
        }
        self.send_conference_infos().await;
    }

    fn local_account_usernames(&self) -> Vec<String> {
        self.registry
            .participants()
            .iter()
            .filter_map(|id| self.get_call(id))
            .filter_map(|call| call.account())
            .map(|account| account.username())
            .collect()
    }

    /// The single chokepoint for layout updates: per-call JSON fan-out,
    /// sink refresh, and the client signal.
    async fn send_conference_infos(&self) {
        // Call and account lookups happen before the layout lock; the
        // actual sends happen on the broadcaster task after it.
        let targets: Vec<(Arc<dyn Call>, String, String)> = self
            .registry
            .participants()
            .iter()
            .filter_map(|id| self.get_call(id))
            .filter_map(|call| {
                // Two local accounts can host a conference on one device, so
                // the advertised host identity is per-call.
                let account = call.account()?;
                let peer = call.peer_uri();
                Some((call, account.uri(), peer))
            })
            .collect();

        let (payloads, local_info) = {
            let layout = self.layout.lock().unwrap();
            let payloads: Vec<(Arc<dyn Call>, String)> = targets
                .into_iter()
                .map(|(call, host_uri, peer)| {
                    let info = layout.assemble_for(&host_uri, &peer);
                    (call, info.to_json())
                })
                .collect();
            (payloads, layout.assemble_for("", ""))
        };

        for (call, payload) in payloads {
            self.broadcaster.send_conf_info(call, payload);
        }

        self.create_sinks(&local_info);

        self.emit(ConferenceSignal::InfosUpdated {
            conf_id: self.id.clone(),
            infos: local_info.to_maps(),
        });
    }

    /// Keep one sink client per layout cell; stale sinks are stopped.
    fn create_sinks(&self, info: &ConfInfo) {
        let factory = match &self.sink_factory {
            Some(factory) if self.video.is_some() => factory.clone(),
            _ => return,
        };

        let wanted: Vec<&crate::layout::ParticipantInfo> =
            info.iter().filter(|row| !row.sink_id.is_empty()).collect();

        for row in &wanted {
            if !self.sinks.contains_key(&row.sink_id) {
                let sink = factory.create_sink(&self.id, row);
                self.sinks.insert(row.sink_id.clone(), sink);
            }
        }

        self.sinks.retain(|sink_id, sink| {
            let keep = wanted.iter().any(|row| row.sink_id == *sink_id);
            if !keep {
                sink.stop();
            }
            keep
        });
    }

    // ---- destruction -----------------------------------------------------

    /// Tear the conference down. Every call leaves the conference; if the
    /// conference was recording, recording continues on a surviving call.
    pub async fn destroy(&self) {
        if self.is_destroyed("destroy") {
            return;
        }
        info!("Destroying conference {}", self.id);

        let default_video_uri = self
            .mixer_factory
            .as_ref()
            .map(|factory| factory.default_device_uri());

        for participant in self.registry.participants() {
            if let Some(call) = self.get_call(&participant) {
                call.exit_conference().await;
                call.reset_conf_info().await;
                // Renegotiate the resolution for the surviving 1:1 call.
                if let Some(uri) = &default_video_uri {
                    call.switch_input(uri).await;
                }

                if self.is_recording() {
                    debug!("Stop recording for conf {}", self.id);
                    self.toggle_recording().await;
                    if !call.is_recording() {
                        debug!(
                            "Conference was recorded, start recording for call {}",
                            call.id()
                        );
                        call.toggle_recording().await;
                    }
                }

                if call.is_peer_recording() {
                    call.peer_recording(true).await;
                }
            }
        }

        for entry in self.sinks.iter() {
            entry.value().stop();
        }
        self.sinks.clear();

        self.set_state(ConferenceState::Destroyed);
    }
}

impl std::fmt::Debug for Conference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conference")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("video_enabled", &self.video_enabled)
            .field("participants", &self.registry.participant_count())
            .field("recording", &self.is_recording())
            .finish()
    }
}
