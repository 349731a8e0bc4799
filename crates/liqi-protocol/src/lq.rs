//! The `lq` message schema: the subset of lobby and game-record messages
//! this client sends, receives, or finds embedded in stored records.
//!
//! Field tags follow the lobby's `.proto` definitions. Messages derive
//! `Serialize` as well so decoded records can be exported as JSON.

use serde::Serialize;

use crate::registry::TypeRegistry;
use crate::types::LobbyRequest;

/// Namespace prefix carried by every type tag, after the leading marker.
pub const NAMESPACE_PREFIX: &str = "lq.";

/// Prefix of every lobby method name.
pub const LOBBY_SERVICE: &str = ".lq.Lobby.";

// ---------------------------------------------------------------------------
// Shared
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, Eq, Serialize, prost::Message)]
pub struct Error {
    #[prost(uint32, tag = "1")]
    pub code: u32,
    #[prost(uint32, repeated, tag = "2")]
    pub u32_params: Vec<u32>,
    #[prost(string, repeated, tag = "3")]
    pub str_params: Vec<String>,
    #[prost(string, tag = "4")]
    pub json_param: String,
}

#[derive(Clone, PartialEq, Eq, Serialize, prost::Message)]
pub struct ClientDeviceInfo {
    #[prost(string, tag = "1")]
    pub device_type: String,
    #[prost(string, tag = "2")]
    pub os: String,
    #[prost(string, tag = "3")]
    pub os_version: String,
    #[prost(string, tag = "4")]
    pub browser: String,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct Account {
    #[prost(uint32, tag = "1")]
    pub account_id: u32,
    #[prost(string, tag = "2")]
    pub nickname: String,
    #[prost(uint32, tag = "3")]
    pub login_time: u32,
    #[prost(uint32, tag = "4")]
    pub logout_time: u32,
    #[prost(uint32, tag = "5")]
    pub room_id: u32,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct GameConnectInfo {
    #[prost(string, tag = "2")]
    pub connect_token: String,
    #[prost(string, tag = "3")]
    pub game_uuid: String,
    #[prost(string, tag = "4")]
    pub location: String,
}

// ---------------------------------------------------------------------------
// Login / logout
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct ReqLogin {
    #[prost(string, tag = "1")]
    pub account: String,
    /// HMAC-SHA256 hex digest of the password, never the plain text.
    #[prost(string, tag = "2")]
    pub password: String,
    #[prost(bool, tag = "3")]
    pub reconnect: bool,
    #[prost(message, optional, tag = "4")]
    pub device: Option<ClientDeviceInfo>,
    #[prost(string, tag = "5")]
    pub random_key: String,
    #[prost(string, tag = "6")]
    pub client_version: String,
    #[prost(bool, tag = "7")]
    pub gen_access_token: bool,
    #[prost(uint32, repeated, tag = "8")]
    pub currency_platforms: Vec<u32>,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct ResLogin {
    #[prost(message, optional, tag = "1")]
    pub error: Option<Error>,
    #[prost(uint32, tag = "2")]
    pub account_id: u32,
    #[prost(message, optional, tag = "3")]
    pub account: Option<Account>,
    #[prost(message, optional, tag = "4")]
    pub game_info: Option<GameConnectInfo>,
    #[prost(bool, tag = "5")]
    pub has_unread_announcement: bool,
    #[prost(string, tag = "6")]
    pub access_token: String,
    #[prost(uint32, tag = "7")]
    pub signup_time: u32,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct ReqLogout {}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct ResLogout {
    #[prost(message, optional, tag = "1")]
    pub error: Option<Error>,
}

// ---------------------------------------------------------------------------
// Game record listing and detail
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct ReqGameRecordList {
    /// 1-based index of the first record.
    #[prost(uint32, tag = "1")]
    pub start: u32,
    #[prost(uint32, tag = "2")]
    pub count: u32,
    #[prost(uint32, tag = "3")]
    pub r#type: u32,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct ResGameRecordList {
    #[prost(message, optional, tag = "1")]
    pub error: Option<Error>,
    #[prost(uint32, tag = "2")]
    pub total_count: u32,
    #[prost(message, repeated, tag = "3")]
    pub record_list: Vec<RecordGame>,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct GameMode {
    #[prost(uint32, tag = "1")]
    pub mode: u32,
    #[prost(uint32, tag = "4")]
    pub ai: u32,
    #[prost(string, tag = "5")]
    pub extendinfo: String,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct GameMetaData {
    #[prost(uint32, tag = "1")]
    pub room_id: u32,
    #[prost(uint32, tag = "2")]
    pub mode_id: u32,
    #[prost(uint32, tag = "3")]
    pub contest_uid: u32,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct GameConfig {
    #[prost(uint32, tag = "1")]
    pub category: u32,
    #[prost(message, optional, tag = "2")]
    pub mode: Option<GameMode>,
    #[prost(message, optional, tag = "3")]
    pub meta: Option<GameMetaData>,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct AccountInfo {
    #[prost(uint32, tag = "1")]
    pub account_id: u32,
    #[prost(uint32, tag = "2")]
    pub seat: u32,
    #[prost(string, tag = "3")]
    pub nickname: String,
    #[prost(uint32, tag = "4")]
    pub avatar_id: u32,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct PlayerItem {
    #[prost(uint32, tag = "1")]
    pub seat: u32,
    #[prost(int32, tag = "2")]
    pub total_point: i32,
    #[prost(int32, tag = "3")]
    pub part_point_1: i32,
    #[prost(int32, tag = "4")]
    pub part_point_2: i32,
    #[prost(int32, tag = "5")]
    pub grading_score: i32,
    #[prost(int32, tag = "6")]
    pub gold: i32,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct GameEndResult {
    #[prost(message, repeated, tag = "1")]
    pub players: Vec<PlayerItem>,
}

/// Summary ("head") of one stored game.
#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct RecordGame {
    #[prost(string, tag = "1")]
    pub uuid: String,
    #[prost(uint32, tag = "2")]
    pub start_time: u32,
    #[prost(uint32, tag = "3")]
    pub end_time: u32,
    #[prost(message, optional, tag = "5")]
    pub config: Option<GameConfig>,
    #[prost(message, repeated, tag = "11")]
    pub accounts: Vec<AccountInfo>,
    #[prost(message, optional, tag = "12")]
    pub result: Option<GameEndResult>,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct ReqGameRecord {
    #[prost(string, tag = "1")]
    pub game_uuid: String,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct ResGameRecord {
    #[prost(message, optional, tag = "1")]
    pub error: Option<Error>,
    #[prost(message, optional, tag = "3")]
    pub head: Option<RecordGame>,
    /// Wrapped `GameDetailRecords`; empty when the record is only
    /// available through `data_url`.
    #[prost(bytes = "vec", tag = "4")]
    pub data: Vec<u8>,
    #[prost(string, tag = "5")]
    pub data_url: String,
}

/// A compound record: each entry is itself a wrapped, typed message.
#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct GameDetailRecords {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub records: Vec<Vec<u8>>,
}

// ---------------------------------------------------------------------------
// Compound record entries
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct RecordNewRound {
    #[prost(uint32, tag = "1")]
    pub chang: u32,
    #[prost(uint32, tag = "2")]
    pub ju: u32,
    #[prost(uint32, tag = "3")]
    pub ben: u32,
    #[prost(string, tag = "4")]
    pub dora: String,
    #[prost(int32, repeated, tag = "5")]
    pub scores: Vec<i32>,
    #[prost(uint32, tag = "6")]
    pub liqibang: u32,
    #[prost(string, repeated, tag = "7")]
    pub tiles0: Vec<String>,
    #[prost(string, repeated, tag = "8")]
    pub tiles1: Vec<String>,
    #[prost(string, repeated, tag = "9")]
    pub tiles2: Vec<String>,
    #[prost(string, repeated, tag = "10")]
    pub tiles3: Vec<String>,
    #[prost(string, tag = "13")]
    pub md5: String,
    #[prost(string, tag = "14")]
    pub paishan: String,
    #[prost(uint32, tag = "15")]
    pub left_tile_count: u32,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct LiqiSuccess {
    #[prost(uint32, tag = "1")]
    pub seat: u32,
    #[prost(int32, tag = "2")]
    pub score: i32,
    #[prost(uint32, tag = "3")]
    pub liqibang: u32,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct RecordDealTile {
    #[prost(uint32, tag = "1")]
    pub seat: u32,
    #[prost(string, tag = "2")]
    pub tile: String,
    #[prost(uint32, tag = "3")]
    pub left_tile_count: u32,
    #[prost(message, optional, tag = "5")]
    pub liqi: Option<LiqiSuccess>,
    #[prost(string, repeated, tag = "6")]
    pub doras: Vec<String>,
    #[prost(bool, repeated, tag = "7")]
    pub zhenting: Vec<bool>,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct RecordDiscardTile {
    #[prost(uint32, tag = "1")]
    pub seat: u32,
    #[prost(string, tag = "2")]
    pub tile: String,
    #[prost(bool, tag = "3")]
    pub is_liqi: bool,
    #[prost(bool, tag = "5")]
    pub moqie: bool,
    #[prost(bool, repeated, tag = "6")]
    pub zhenting: Vec<bool>,
    #[prost(bool, tag = "8")]
    pub is_wliqi: bool,
    #[prost(string, repeated, tag = "9")]
    pub doras: Vec<String>,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct RecordChiPengGang {
    #[prost(uint32, tag = "1")]
    pub seat: u32,
    #[prost(uint32, tag = "2")]
    pub r#type: u32,
    #[prost(string, repeated, tag = "3")]
    pub tiles: Vec<String>,
    #[prost(uint32, repeated, tag = "4")]
    pub froms: Vec<u32>,
    #[prost(message, optional, tag = "5")]
    pub liqi: Option<LiqiSuccess>,
    #[prost(bool, repeated, tag = "7")]
    pub zhenting: Vec<bool>,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct RecordAnGangAddGang {
    #[prost(uint32, tag = "1")]
    pub seat: u32,
    #[prost(uint32, tag = "2")]
    pub r#type: u32,
    #[prost(string, tag = "3")]
    pub tiles: String,
    #[prost(string, repeated, tag = "6")]
    pub doras: Vec<String>,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct FanInfo {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(uint32, tag = "2")]
    pub val: u32,
    #[prost(uint32, tag = "3")]
    pub id: u32,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct HuleInfo {
    #[prost(string, repeated, tag = "1")]
    pub hand: Vec<String>,
    #[prost(string, repeated, tag = "2")]
    pub ming: Vec<String>,
    #[prost(string, tag = "3")]
    pub hu_tile: String,
    #[prost(uint32, tag = "4")]
    pub seat: u32,
    #[prost(bool, tag = "5")]
    pub zimo: bool,
    #[prost(bool, tag = "6")]
    pub qinjia: bool,
    #[prost(bool, tag = "7")]
    pub liqi: bool,
    #[prost(string, repeated, tag = "8")]
    pub doras: Vec<String>,
    #[prost(string, repeated, tag = "9")]
    pub li_doras: Vec<String>,
    #[prost(bool, tag = "10")]
    pub yiman: bool,
    #[prost(uint32, tag = "11")]
    pub count: u32,
    #[prost(message, repeated, tag = "12")]
    pub fans: Vec<FanInfo>,
    #[prost(uint32, tag = "13")]
    pub fu: u32,
    #[prost(string, tag = "14")]
    pub title: String,
    #[prost(uint32, tag = "15")]
    pub point_rong: u32,
    #[prost(uint32, tag = "16")]
    pub point_zimo_qin: u32,
    #[prost(uint32, tag = "17")]
    pub point_zimo_xian: u32,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct GameEnd {
    #[prost(int32, repeated, tag = "1")]
    pub scores: Vec<i32>,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct RecordHule {
    #[prost(message, repeated, tag = "1")]
    pub hules: Vec<HuleInfo>,
    #[prost(int32, repeated, tag = "2")]
    pub old_scores: Vec<i32>,
    #[prost(int32, repeated, tag = "3")]
    pub delta_scores: Vec<i32>,
    #[prost(uint32, tag = "4")]
    pub wait_timeout: u32,
    #[prost(int32, repeated, tag = "5")]
    pub scores: Vec<i32>,
    #[prost(message, optional, tag = "6")]
    pub gameend: Option<GameEnd>,
    #[prost(string, repeated, tag = "7")]
    pub doras: Vec<String>,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct NoTilePlayerInfo {
    #[prost(bool, tag = "3")]
    pub tingpai: bool,
    #[prost(string, repeated, tag = "4")]
    pub hand: Vec<String>,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct NoTileScoreInfo {
    #[prost(uint32, tag = "1")]
    pub seat: u32,
    #[prost(int32, repeated, tag = "2")]
    pub old_scores: Vec<i32>,
    #[prost(int32, repeated, tag = "3")]
    pub delta_scores: Vec<i32>,
    #[prost(string, repeated, tag = "4")]
    pub hand: Vec<String>,
    #[prost(string, repeated, tag = "5")]
    pub ming: Vec<String>,
    #[prost(string, repeated, tag = "6")]
    pub doras: Vec<String>,
    #[prost(uint32, tag = "7")]
    pub score: u32,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct RecordNoTile {
    #[prost(bool, tag = "1")]
    pub liujumanguan: bool,
    #[prost(message, repeated, tag = "2")]
    pub players: Vec<NoTilePlayerInfo>,
    #[prost(message, repeated, tag = "3")]
    pub scores: Vec<NoTileScoreInfo>,
    #[prost(bool, tag = "4")]
    pub gameend: bool,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct RecordLiuJu {
    #[prost(uint32, tag = "1")]
    pub r#type: u32,
    #[prost(message, optional, tag = "2")]
    pub gameend: Option<GameEnd>,
    #[prost(uint32, tag = "3")]
    pub seat: u32,
    #[prost(string, repeated, tag = "4")]
    pub tiles: Vec<String>,
    #[prost(message, optional, tag = "5")]
    pub liqi: Option<LiqiSuccess>,
    #[prost(string, repeated, tag = "6")]
    pub allplayertiles: Vec<String>,
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Pushed when the account is logged in from somewhere else.
#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct NotifyAnotherLogin {}

/// Pushed by the lobby shortly before it drops an idle connection.
#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct NotifyAccountLogout {}

// ---------------------------------------------------------------------------
// Method table
// ---------------------------------------------------------------------------

impl LobbyRequest for ReqLogin {
    const METHOD: &'static str = ".lq.Lobby.login";
    type Response = ResLogin;
}

impl LobbyRequest for ReqLogout {
    const METHOD: &'static str = ".lq.Lobby.logout";
    type Response = ResLogout;
}

impl LobbyRequest for ReqGameRecordList {
    const METHOD: &'static str = ".lq.Lobby.fetchGameRecordList";
    type Response = ResGameRecordList;
}

impl LobbyRequest for ReqGameRecord {
    const METHOD: &'static str = ".lq.Lobby.fetchGameRecord";
    type Response = ResGameRecord;
}

/// Builds the registry of every message in this module, keyed by its bare
/// name.
pub(crate) fn registry() -> TypeRegistry {
    TypeRegistry::new()
        .register::<Error>("Error")
        .register::<ReqLogin>("ReqLogin")
        .register::<ResLogin>("ResLogin")
        .register::<ReqLogout>("ReqLogout")
        .register::<ResLogout>("ResLogout")
        .register::<ReqGameRecordList>("ReqGameRecordList")
        .register::<ResGameRecordList>("ResGameRecordList")
        .register::<RecordGame>("RecordGame")
        .register::<ReqGameRecord>("ReqGameRecord")
        .register::<ResGameRecord>("ResGameRecord")
        .register::<GameDetailRecords>("GameDetailRecords")
        .register::<RecordNewRound>("RecordNewRound")
        .register::<RecordDealTile>("RecordDealTile")
        .register::<RecordDiscardTile>("RecordDiscardTile")
        .register::<RecordChiPengGang>("RecordChiPengGang")
        .register::<RecordAnGangAddGang>("RecordAnGangAddGang")
        .register::<RecordHule>("RecordHule")
        .register::<RecordNoTile>("RecordNoTile")
        .register::<RecordLiuJu>("RecordLiuJu")
        .register::<NotifyAnotherLogin>("NotifyAnotherLogin")
        .register::<NotifyAccountLogout>("NotifyAccountLogout")
}

/// Returns the wire tag (`.lq.<name>`) for a bare message name.
pub fn type_tag(name: &str) -> String {
    format!(".{NAMESPACE_PREFIX}{name}")
}
