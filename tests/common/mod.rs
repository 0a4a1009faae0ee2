//! Shared stub collaborators for conference integration tests.
//!
//! Every external seam of the engine (calls, accounts, ring-buffer pool,
//! video mixer, recorder, sinks) gets a recording stub so tests can assert
//! on the exact side effects of an operation.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use conference_core::account::Account;
use conference_core::audio::{RingBufferGuard, RingBufferPool};
use conference_core::call::{Call, CallRegistry};
use conference_core::layout::ParticipantInfo;
use conference_core::media::{MediaAttribute, MediaMap, MediaType};
use conference_core::recorder::Recorder;
use conference_core::types::{CallId, ConfId};
use conference_core::video::{
    SinkClient, SinkFactory, SourceInfo, SourcesUpdatedCallback, VideoLayout, VideoMixer,
    VideoMixerFactory, VideoSourceKey,
};

/// Opt-in test logging, driven by `RUST_LOG`.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Give spawned tasks (layout updates, broadcaster) a chance to run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(30)).await;
}

/// Drain every pending client signal.
pub fn drain_signals(
    rx: &mut tokio::sync::mpsc::UnboundedReceiver<conference_core::ConferenceSignal>,
) -> Vec<conference_core::ConferenceSignal> {
    let mut signals = Vec::new();
    while let Ok(signal) = rx.try_recv() {
        signals.push(signal);
    }
    signals
}

/// Count the layout-update signals in a batch.
pub fn infos_updated_count(signals: &[conference_core::ConferenceSignal]) -> usize {
    signals
        .iter()
        .filter(|s| matches!(s, conference_core::ConferenceSignal::InfosUpdated { .. }))
        .count()
}

/// The row list of the last layout-update signal in a batch, if any.
pub fn last_infos(
    signals: &[conference_core::ConferenceSignal],
) -> Option<Vec<std::collections::HashMap<String, String>>> {
    signals
        .iter()
        .rev()
        .find_map(|s| match s {
            conference_core::ConferenceSignal::InfosUpdated { infos, .. } => Some(infos.clone()),
            _ => None,
        })
}

// ---- account ---------------------------------------------------------------

pub struct StubAccount {
    pub username: String,
    pub device_id: String,
    pub video_enabled: bool,
    pub default_moderators: Vec<String>,
    pub local_moderators: bool,
    pub all_moderators: bool,
}

impl StubAccount {
    pub fn new(username: &str) -> Arc<Self> {
        Arc::new(Self {
            username: username.to_string(),
            device_id: format!("{username}-device"),
            video_enabled: true,
            default_moderators: Vec::new(),
            local_moderators: false,
            all_moderators: false,
        })
    }

    pub fn with_moderators(username: &str, moderators: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            default_moderators: moderators.iter().map(|m| m.to_string()).collect(),
            ..Self::plain(username)
        })
    }

    fn plain(username: &str) -> Self {
        Self {
            username: username.to_string(),
            device_id: format!("{username}-device"),
            video_enabled: true,
            default_moderators: Vec::new(),
            local_moderators: false,
            all_moderators: false,
        }
    }
}

impl Account for StubAccount {
    fn id(&self) -> String {
        format!("acc-{}", self.username)
    }

    fn username(&self) -> String {
        self.username.clone()
    }

    fn uri(&self) -> String {
        format!("{}@home", self.username)
    }

    fn current_device_id(&self) -> String {
        self.device_id.clone()
    }

    fn is_video_enabled(&self) -> bool {
        self.video_enabled
    }

    fn default_moderators(&self) -> Vec<String> {
        self.default_moderators.clone()
    }

    fn local_moderators_enabled(&self) -> bool {
        self.local_moderators
    }

    fn all_moderators_enabled(&self) -> bool {
        self.all_moderators
    }
}

// ---- ring-buffer pool ------------------------------------------------------

struct StubGuard;
impl RingBufferGuard for StubGuard {}

/// Edge-set model of the pool: `(reader, source)` pairs.
#[derive(Default)]
pub struct StubPool {
    pub edges: Mutex<HashSet<(String, String)>>,
    pub ops: Mutex<Vec<String>>,
}

impl StubPool {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn edge_set(&self) -> HashSet<(String, String)> {
        self.edges.lock().unwrap().clone()
    }

    pub fn op_count(&self, op: &str) -> usize {
        self.ops.lock().unwrap().iter().filter(|o| o.as_str() == op).count()
    }

    fn log(&self, op: String) {
        self.ops.lock().unwrap().push(op);
    }
}

impl RingBufferPool for StubPool {
    fn bind(&self, a: &str, b: &str) {
        self.log(format!("bind {a} {b}"));
        let mut edges = self.edges.lock().unwrap();
        edges.insert((a.to_string(), b.to_string()));
        edges.insert((b.to_string(), a.to_string()));
    }

    fn bind_half_duplex(&self, id: &str, source: &str) {
        self.log(format!("bind_half_duplex {id} {source}"));
        self.edges.lock().unwrap().insert((id.to_string(), source.to_string()));
    }

    fn unbind(&self, a: &str, b: &str) {
        self.log(format!("unbind {a} {b}"));
        let mut edges = self.edges.lock().unwrap();
        edges.remove(&(a.to_string(), b.to_string()));
        edges.remove(&(b.to_string(), a.to_string()));
    }

    fn unbind_all_half_duplex(&self, source: &str) {
        self.log(format!("unbind_all_half_duplex {source}"));
        self.edges.lock().unwrap().retain(|(_, s)| s != source);
    }

    fn unbind_all(&self, id: &str) {
        self.log(format!("unbind_all {id}"));
        self.edges.lock().unwrap().retain(|(r, s)| r != id && s != id);
    }

    fn flush(&self, id: &str) {
        self.log(format!("flush {id}"));
    }

    fn flush_all(&self) {
        self.log("flush_all".to_string());
    }

    fn create_ring_buffer(&self, id: &str) -> Box<dyn RingBufferGuard> {
        self.log(format!("create_ring_buffer {id}"));
        Box::new(StubGuard)
    }
}

// ---- call ------------------------------------------------------------------

pub struct StubCall {
    pub call_id: CallId,
    pub peer: String,
    pub account: Arc<dyn Account>,
    pub peer_muted: AtomicBool,
    pub peer_recording_flag: AtomicBool,
    pub recording: AtomicBool,
    pub media: Mutex<Vec<MediaAttribute>>,
    pub receive_source: Mutex<Option<VideoSourceKey>>,
    pub frame_size: Mutex<(i32, i32)>,
    pub in_conference: AtomicBool,
    pub conf_info_resets: AtomicUsize,
    pub switched_inputs: Mutex<Vec<String>>,
    pub sent_conf_infos: Mutex<Vec<String>>,
    pub sent_orders: Mutex<Vec<serde_json::Value>>,
    pub requested_media: Mutex<Vec<Vec<MediaMap>>>,
    pub answered_media: Mutex<Vec<Vec<MediaMap>>>,
    pub dummy_video_added: AtomicUsize,
    pub dummy_video_removed: AtomicUsize,
    pub record_states: Mutex<Vec<bool>>,
    pub peer_recording_notices: Mutex<Vec<bool>>,
    pub media_change_needs_mixer_update: AtomicBool,
}

impl StubCall {
    pub fn new(name: &str, peer: &str, account: Arc<dyn Account>) -> Arc<Self> {
        Arc::new(Self {
            call_id: CallId::from_name(name),
            peer: peer.to_string(),
            account,
            peer_muted: AtomicBool::new(false),
            peer_recording_flag: AtomicBool::new(false),
            recording: AtomicBool::new(false),
            media: Mutex::new(vec![MediaAttribute::capture(MediaType::Audio, "", "audio_0")]),
            receive_source: Mutex::new(None),
            frame_size: Mutex::new((0, 0)),
            in_conference: AtomicBool::new(false),
            conf_info_resets: AtomicUsize::new(0),
            switched_inputs: Mutex::new(Vec::new()),
            sent_conf_infos: Mutex::new(Vec::new()),
            sent_orders: Mutex::new(Vec::new()),
            requested_media: Mutex::new(Vec::new()),
            answered_media: Mutex::new(Vec::new()),
            dummy_video_added: AtomicUsize::new(0),
            dummy_video_removed: AtomicUsize::new(0),
            record_states: Mutex::new(Vec::new()),
            peer_recording_notices: Mutex::new(Vec::new()),
            media_change_needs_mixer_update: AtomicBool::new(false),
        })
    }

    pub fn set_peer_muted(&self, muted: bool) {
        self.peer_muted.store(muted, Ordering::SeqCst);
    }

    pub fn set_media(&self, media: Vec<MediaAttribute>) {
        *self.media.lock().unwrap() = media;
    }

    pub fn sent_conf_info_count(&self) -> usize {
        self.sent_conf_infos.lock().unwrap().len()
    }

    pub fn last_conf_info(&self) -> Option<String> {
        self.sent_conf_infos.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Call for StubCall {
    fn id(&self) -> CallId {
        self.call_id.clone()
    }

    fn peer_uri(&self) -> String {
        self.peer.clone()
    }

    fn is_peer_muted(&self) -> bool {
        self.peer_muted.load(Ordering::SeqCst)
    }

    fn is_peer_recording(&self) -> bool {
        self.peer_recording_flag.load(Ordering::SeqCst)
    }

    fn account(&self) -> Option<Arc<dyn Account>> {
        Some(self.account.clone())
    }

    fn media_attributes(&self) -> Vec<MediaAttribute> {
        self.media.lock().unwrap().clone()
    }

    fn peer_device_id(&self) -> Option<String> {
        Some(format!("{}-device", conference_core::types::strip_device_suffix(&self.peer)))
    }

    fn decoded_frame_size(&self) -> (i32, i32) {
        *self.frame_size.lock().unwrap()
    }

    fn receive_video_source(&self) -> Option<VideoSourceKey> {
        *self.receive_source.lock().unwrap()
    }

    fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    async fn enter_conference(&self, _conf_id: &ConfId) {
        self.in_conference.store(true, Ordering::SeqCst);
    }

    async fn exit_conference(&self) {
        self.in_conference.store(false, Ordering::SeqCst);
    }

    async fn reset_conf_info(&self) {
        self.conf_info_resets.fetch_add(1, Ordering::SeqCst);
    }

    async fn switch_input(&self, uri: &str) {
        self.switched_inputs.lock().unwrap().push(uri.to_string());
    }

    async fn send_conf_info(&self, payload: String) {
        self.sent_conf_infos.lock().unwrap().push(payload);
    }

    async fn send_conf_order(&self, order: serde_json::Value) {
        self.sent_orders.lock().unwrap().push(order);
    }

    async fn request_media_change(&self, media: Vec<MediaMap>) {
        self.requested_media.lock().unwrap().push(media);
    }

    fn check_media_change_request(&self, _remote: &[MediaMap]) -> bool {
        self.media_change_needs_mixer_update.load(Ordering::SeqCst)
    }

    async fn answer_media_change_request(&self, media: Vec<MediaMap>) {
        self.answered_media.lock().unwrap().push(media);
    }

    async fn add_dummy_video_session(&self) {
        self.dummy_video_added.fetch_add(1, Ordering::SeqCst);
    }

    async fn remove_dummy_video_sessions(&self) {
        self.dummy_video_removed.fetch_add(1, Ordering::SeqCst);
    }

    async fn toggle_recording(&self) -> bool {
        let new_state = !self.recording.load(Ordering::SeqCst);
        self.recording.store(new_state, Ordering::SeqCst);
        new_state
    }

    async fn peer_recording(&self, state: bool) {
        self.peer_recording_notices.lock().unwrap().push(state);
    }

    async fn update_record_state(&self, state: bool) {
        self.record_states.lock().unwrap().push(state);
    }
}

// ---- call registry ---------------------------------------------------------

#[derive(Default)]
pub struct StubCallRegistry {
    pub calls: DashMap<CallId, Arc<StubCall>>,
    pub usernames: Mutex<Vec<String>>,
    pub hangups: Mutex<Vec<(String, CallId)>>,
}

impl StubCallRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, call: Arc<StubCall>) {
        self.calls.insert(call.call_id.clone(), call);
    }

    pub fn remove(&self, call_id: &CallId) {
        self.calls.remove(call_id);
    }
}

#[async_trait]
impl CallRegistry for StubCallRegistry {
    fn get_call(&self, call_id: &CallId) -> Option<Arc<dyn Call>> {
        self.calls.get(call_id).map(|entry| entry.value().clone() as Arc<dyn Call>)
    }

    fn local_usernames(&self) -> Vec<String> {
        self.usernames.lock().unwrap().clone()
    }

    async fn hangup_call(&self, account_id: &str, call_id: &CallId) {
        self.hangups.lock().unwrap().push((account_id.to_string(), call_id.clone()));
    }
}

// ---- video mixer -----------------------------------------------------------

#[derive(Default)]
pub struct StubMixer {
    pub width: AtomicUsize,
    pub height: AtomicUsize,
    pub active: Mutex<Option<VideoSourceKey>>,
    pub active_host: AtomicBool,
    pub layout: Mutex<Option<VideoLayout>>,
    pub inputs: Mutex<Vec<String>>,
    pub secondary_inputs: Mutex<Vec<String>>,
    pub input_stops: AtomicUsize,
    pub attached: Mutex<HashSet<u64>>,
    pub layout_updates: AtomicUsize,
    pub callback: Mutex<Option<SourcesUpdatedCallback>>,
}

impl StubMixer {
    pub fn new() -> Arc<Self> {
        let mixer = Self::default();
        mixer.width.store(1280, Ordering::SeqCst);
        mixer.height.store(720, Ordering::SeqCst);
        Arc::new(mixer)
    }

    /// Drive the sources-updated callback like the mixer thread would.
    pub fn fire_sources_updated(&self, infos: Vec<SourceInfo>) {
        if let Some(callback) = self.callback.lock().unwrap().as_ref() {
            callback(infos);
        }
    }

    pub fn current_layout(&self) -> Option<VideoLayout> {
        *self.layout.lock().unwrap()
    }
}

impl VideoMixer for StubMixer {
    fn width(&self) -> i32 {
        self.width.load(Ordering::SeqCst) as i32
    }

    fn height(&self) -> i32 {
        self.height.load(Ordering::SeqCst) as i32
    }

    fn switch_input(&self, uri: &str) {
        self.inputs.lock().unwrap().push(uri.to_string());
    }

    fn switch_secondary_input(&self, uri: &str) {
        self.secondary_inputs.lock().unwrap().push(uri.to_string());
    }

    fn stop_input(&self) {
        self.input_stops.fetch_add(1, Ordering::SeqCst);
    }

    fn attach_source(&self, key: VideoSourceKey) {
        self.attached.lock().unwrap().insert(key.0);
    }

    fn detach_source(&self, key: VideoSourceKey) {
        self.attached.lock().unwrap().remove(&key.0);
    }

    fn set_active_source(&self, key: Option<VideoSourceKey>) {
        *self.active.lock().unwrap() = key;
        self.active_host.store(false, Ordering::SeqCst);
    }

    fn set_active_host(&self) {
        *self.active.lock().unwrap() = None;
        self.active_host.store(true, Ordering::SeqCst);
    }

    fn active_source(&self) -> Option<VideoSourceKey> {
        *self.active.lock().unwrap()
    }

    fn set_layout(&self, layout: VideoLayout) {
        *self.layout.lock().unwrap() = Some(layout);
    }

    fn update_layout(&self) {
        self.layout_updates.fetch_add(1, Ordering::SeqCst);
    }

    fn set_on_sources_updated(&self, callback: SourcesUpdatedCallback) {
        *self.callback.lock().unwrap() = Some(callback);
    }
}

pub struct StubMixerFactory {
    pub mixer: Arc<StubMixer>,
}

impl StubMixerFactory {
    pub fn new(mixer: Arc<StubMixer>) -> Arc<Self> {
        Arc::new(Self { mixer })
    }
}

impl VideoMixerFactory for StubMixerFactory {
    fn create_mixer(&self, _conf_id: &ConfId, local_input: &str) -> Arc<dyn VideoMixer> {
        self.mixer.inputs.lock().unwrap().push(local_input.to_string());
        self.mixer.clone()
    }

    fn default_device_uri(&self) -> String {
        "camera://default".to_string()
    }
}

// ---- sinks -----------------------------------------------------------------

pub struct StubSink {
    pub sink_id: String,
    pub stopped: AtomicBool,
}

impl SinkClient for StubSink {
    fn id(&self) -> &str {
        &self.sink_id
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct StubSinkFactory {
    pub created: Mutex<Vec<String>>,
}

impl StubSinkFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl SinkFactory for StubSinkFactory {
    fn create_sink(&self, _conf_id: &ConfId, cell: &ParticipantInfo) -> Arc<dyn SinkClient> {
        self.created.lock().unwrap().push(cell.sink_id.clone());
        Arc::new(StubSink {
            sink_id: cell.sink_id.clone(),
            stopped: AtomicBool::new(false),
        })
    }
}

// ---- fixture ---------------------------------------------------------------

use conference_core::conference::{Conference, ConferenceBuilder};

/// A conference wired to a full stub environment.
pub struct TestConference {
    pub conference: Arc<Conference>,
    pub account: Arc<StubAccount>,
    pub registry: Arc<StubCallRegistry>,
    pub pool: Arc<StubPool>,
    pub mixer: Arc<StubMixer>,
    pub sink_factory: Arc<StubSinkFactory>,
    pub recorder: Arc<StubRecorder>,
}

impl TestConference {
    /// Video conference hosted by `alice`.
    pub fn build() -> Self {
        Self::build_with_account(StubAccount::new("alice"))
    }

    pub fn build_with_account(account: Arc<StubAccount>) -> Self {
        init_logging();
        let registry = StubCallRegistry::new();
        let pool = StubPool::new();
        let mixer = StubMixer::new();
        let sink_factory = StubSinkFactory::new();
        let recorder = StubRecorder::new();

        let conference = ConferenceBuilder::new(
            account.clone() as Arc<dyn Account>,
            registry.clone() as Arc<dyn CallRegistry>,
            pool.clone() as Arc<dyn RingBufferPool>,
            recorder.clone() as Arc<dyn Recorder>,
        )
        .with_video(
            StubMixerFactory::new(mixer.clone()),
            sink_factory.clone() as Arc<dyn SinkFactory>,
        )
        .build();

        Self {
            conference,
            account,
            registry,
            pool,
            mixer,
            sink_factory,
            recorder,
        }
    }

    /// Register a stub call under this fixture's account and add it to the
    /// conference.
    pub async fn join(&self, name: &str, peer: &str) -> Arc<StubCall> {
        let call = StubCall::new(name, peer, self.account.clone() as Arc<dyn Account>);
        self.registry.register(call.clone());
        self.conference.add_participant(&call.call_id).await;
        call
    }
}

// ---- recorder --------------------------------------------------------------

#[derive(Default)]
pub struct StubRecorder {
    pub added: Mutex<Vec<String>>,
    pub detached: Mutex<Vec<String>>,
}

impl StubRecorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl Recorder for StubRecorder {
    fn add_stream(&self, label: &str) -> bool {
        self.added.lock().unwrap().push(label.to_string());
        true
    }

    fn detach_stream(&self, label: &str) {
        self.detached.lock().unwrap().push(label.to_string());
    }
}
