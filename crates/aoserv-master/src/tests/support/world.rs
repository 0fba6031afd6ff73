//! Scenario world: a master wired to in-memory collaborators plus the
//! clients talking to it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use aoserv_protocol::requests::{
    AddDnsRecord, DisableAccount, DnsRecordType, GetRowCount, GetTable, InvalidateTable,
    RemoveDnsRecord,
};
use aoserv_protocol::{
    AccountName, CommandId, DomainName, HostId, NoticeFrame, ProtocolVersion, ResponseStatus,
    TableId, UserName, WireError,
};
use camino::Utf8PathBuf;

use crate::access::AccessDirectory;
use crate::bootstrap::{BootstrapError, ConfigLoader, Master, RunningMaster, bootstrap_with};
use crate::context::Collaborators;
use crate::fanout::SyncOutcome;
use crate::handshake::{AuthError, Authenticator};
use crate::invalidate::InvalidateList;
use crate::services::ServiceRegistration;

use super::client::TestClient;
use super::config_loader::{FailingConfigLoader, TestConfigLoader};
use super::memory::{MemoryDatabase, MemoryDirectory};
use super::reporter::RecordingHealthReporter;
use super::services::{FakeDnsService, StubbornService};

pub const PASSWORD: &str = "secret";

/// Accepts any known administrator presenting [`PASSWORD`].
struct DirectoryAuthenticator {
    directory: MemoryDirectory,
}

impl Authenticator for DirectoryAuthenticator {
    fn authenticate(&self, user: &UserName, password: &str) -> Result<(), AuthError> {
        if password != PASSWORD || self.directory.load_scope(user).is_err() {
            return Err(AuthError::new("invalid user name or password"));
        }
        Ok(())
    }
}

/// What the master answered to the last command a client sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Done { value: Option<i32>, tail: Vec<i32> },
    Rows(Vec<i32>),
    SqlException(String),
    IoException(String),
}

pub struct MasterWorld {
    loader: Box<dyn ConfigLoader>,
    pub reporter: Arc<RecordingHealthReporter>,
    pub database: MemoryDatabase,
    pub directory: MemoryDirectory,
    stubborn: bool,
    master: Option<Master>,
    running: Option<RunningMaster>,
    bootstrap_error: Option<BootstrapError>,
    clients: HashMap<String, TestClient>,
    replies: HashMap<String, Reply>,
    frames: HashMap<String, Vec<NoticeFrame>>,
    refusal: Option<String>,
    version_offer: Option<(bool, String)>,
    sync: Option<JoinHandle<SyncOutcome>>,
}

impl MasterWorld {
    /// A master for `alice` and `bob` of `acme`, `carol` of `globex` and the
    /// superuser `root`.
    #[must_use]
    pub fn new() -> Self {
        let directory = MemoryDirectory::default();
        directory.add_administrator("alice", "acme", &[1]);
        directory.add_administrator("bob", "acme", &[1]);
        directory.add_administrator("carol", "globex", &[3]);
        directory.add_superuser("root", "hostmaster");
        Self {
            loader: Box::new(TestConfigLoader::tcp()),
            reporter: Arc::new(RecordingHealthReporter::default()),
            database: MemoryDatabase::default(),
            directory,
            stubborn: false,
            master: None,
            running: None,
            bootstrap_error: None,
            clients: HashMap::new(),
            replies: HashMap::new(),
            frames: HashMap::new(),
            refusal: None,
            version_offer: None,
            sync: None,
        }
    }

    pub fn use_failing_loader(&mut self) {
        self.loader = Box::new(FailingConfigLoader);
    }

    pub fn use_unix_socket(&mut self) {
        self.loader = Box::new(TestConfigLoader::unix());
    }

    pub fn add_stubborn_service(&mut self) {
        self.stubborn = true;
    }

    fn collaborators(&self) -> Collaborators {
        let dns = FakeDnsService::new(self.directory.clone())
            .with_zone("example.com", "acme")
            .with_zone("globex.com", "globex");
        let mut services: Vec<ServiceRegistration> = Vec::new();
        if self.stubborn {
            services.push(StubbornService::register());
        } else {
            services.push(dns.register());
        }
        Collaborators {
            database: Arc::new(self.database.clone()),
            authenticator: Arc::new(DirectoryAuthenticator {
                directory: self.directory.clone(),
            }),
            directory: Arc::new(self.directory.clone()),
            services,
        }
    }

    /// Runs the bootstrap sequence once.
    pub fn bootstrap(&mut self) {
        if self.master.is_some() || self.running.is_some() || self.bootstrap_error.is_some() {
            return;
        }
        let collaborators = self.collaborators();
        match bootstrap_with(&*self.loader, self.reporter.clone(), collaborators) {
            Ok(master) => self.master = Some(master),
            Err(error) => self.bootstrap_error = Some(error),
        }
    }

    /// Bootstraps if needed and starts accepting clients.
    pub fn start(&mut self) {
        self.bootstrap();
        if let Some(master) = self.master.take() {
            self.running = Some(master.start().expect("start master"));
        }
    }

    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            running.stop().expect("stop master");
        }
    }

    /// Unix socket path the loader configures, if any.
    #[must_use]
    pub fn configured_socket_path(&self) -> Option<Utf8PathBuf> {
        let config = self.loader.load().ok()?;
        config.listen_socket().unix_path().map(ToOwned::to_owned)
    }

    #[must_use]
    pub fn bootstrap_error(&self) -> Option<&BootstrapError> {
        self.bootstrap_error.as_ref()
    }

    #[must_use]
    pub fn running(&self) -> Option<&RunningMaster> {
        self.running.as_ref()
    }

    #[must_use]
    pub fn master(&self) -> Option<&Master> {
        self.master.as_ref()
    }

    fn address(&self) -> SocketAddr {
        self.running
            .as_ref()
            .and_then(RunningMaster::local_addr)
            .expect("master listening on TCP")
    }

    /// Logs `user` in, remembering a refusal instead of failing.
    pub fn connect(&mut self, user: &str, version: ProtocolVersion, password: &str) {
        match TestClient::connect(self.address(), version, user, password) {
            Ok(client) => {
                self.clients.insert(user.to_owned(), client);
            }
            Err(message) => self.refusal = Some(message),
        }
    }

    pub fn login(&mut self, user: &str) {
        self.connect(user, ProtocolVersion::CURRENT, PASSWORD);
        assert!(self.refusal.is_none(), "login refused: {:?}", self.refusal);
    }

    #[must_use]
    pub fn refusal(&self) -> Option<&str> {
        self.refusal.as_deref()
    }

    pub fn offer_version(&mut self, version: &str) {
        self.version_offer = Some(TestClient::offer_version(self.address(), version));
    }

    /// Whether the last offered version was accepted, and the version the
    /// server advertised.
    #[must_use]
    pub fn version_offer(&self) -> Option<&(bool, String)> {
        self.version_offer.as_ref()
    }

    pub fn client(&mut self, user: &str) -> &mut TestClient {
        self.clients
            .get_mut(user)
            .unwrap_or_else(|| panic!("{user} has not connected"))
    }

    #[must_use]
    pub fn reply(&self, user: &str) -> Option<&Reply> {
        self.replies.get(user)
    }

    fn read_reply(&mut self, user: &str, carries_int: bool) -> Result<(), WireError> {
        let client = self.client(user);
        let reply = match client.read_status()? {
            ResponseStatus::Done => {
                let value = if carries_int {
                    Some(client.read_int()?)
                } else {
                    None
                };
                Reply::Done {
                    value,
                    tail: client.read_tail()?,
                }
            }
            ResponseStatus::SqlException => Reply::SqlException(client.read_message()?),
            ResponseStatus::IoException => Reply::IoException(client.read_message()?),
            ResponseStatus::Next => panic!("unexpected row for {user}"),
        };
        self.replies.insert(user.to_owned(), reply);
        Ok(())
    }

    pub fn ping(&mut self, user: &str) {
        let client = self.client(user);
        client.send(CommandId::Ping).expect("send ping");
        let status = client.read_status().expect("ping status");
        let reply = match status {
            ResponseStatus::Done => Reply::Done {
                value: None,
                tail: Vec::new(),
            },
            other => panic!("ping answered with {other}"),
        };
        self.replies.insert(user.to_owned(), reply);
    }

    pub fn test_connection(&mut self, user: &str) {
        let client = self.client(user);
        client
            .send(CommandId::TestConnection)
            .expect("send connection test");
        let reply = match client.read_status().expect("connection test status") {
            ResponseStatus::Done => Reply::Done {
                value: None,
                tail: Vec::new(),
            },
            ResponseStatus::SqlException => {
                Reply::SqlException(client.read_message().expect("connection test message"))
            }
            other => panic!("connection test answered with {other}"),
        };
        self.replies.insert(user.to_owned(), reply);
    }

    pub fn add_dns_record(&mut self, user: &str, zone: &str) {
        let request = AddDnsRecord {
            zone: DomainName::new(zone).expect("valid zone"),
            domain: "www".to_owned(),
            record_type: DnsRecordType::A,
            priority: None,
            destination: "192.0.2.10".to_owned(),
            ttl: Some(3600),
        };
        self.client(user)
            .send_with(CommandId::AddDnsRecord, |out| out.write(&request))
            .expect("send add record");
        self.read_reply(user, true).expect("add record reply");
    }

    /// Sends `ADD_DNS_RECORD` with `zone` written verbatim, skipping the
    /// client-side grammar check. Only the zone is sent: the master must
    /// give up on the request before reading further arguments.
    pub fn add_dns_record_in_raw_zone(&mut self, user: &str, zone: &str) {
        self.client(user)
            .send_with(CommandId::AddDnsRecord, |out| out.write_utf(zone))
            .expect("send add record");
        self.read_reply(user, true).expect("add record reply");
    }

    pub fn remove_dns_record(&mut self, user: &str, record_id: i32) {
        let request = RemoveDnsRecord { record_id };
        self.client(user)
            .send_with(CommandId::RemoveDnsRecord, |out| out.write(&request))
            .expect("send remove record");
        self.read_reply(user, false).expect("remove record reply");
    }

    pub fn disable_account(&mut self, user: &str, account: &str) {
        let request = DisableAccount {
            account: AccountName::new(account).expect("valid account"),
            reason: Some("unpaid invoices".to_owned()),
        };
        self.client(user)
            .send_with(CommandId::DisableAccount, |out| out.write(&request))
            .expect("send disable");
        self.read_reply(user, false).expect("disable reply");
    }

    pub fn row_count(&mut self, user: &str, table: TableId) {
        let client_table_id = table
            .client_id(ProtocolVersion::CURRENT)
            .expect("table visible to current clients");
        self.client(user)
            .send_with(CommandId::GetRowCount, |out| {
                out.write(&GetRowCount { client_table_id })
            })
            .expect("send row count");
        self.read_reply(user, true).expect("row count reply");
    }

    pub fn get_table(&mut self, user: &str, client_table_id: i32) {
        let client = self.client(user);
        client
            .send_with(CommandId::GetTable, |out| {
                out.write(&GetTable {
                    client_table_id,
                    progress: false,
                })
            })
            .expect("send get table");
        let rows = client.read_row_ids().expect("rows");
        self.replies.insert(user.to_owned(), Reply::Rows(rows));
    }

    pub fn invalidate_table(&mut self, user: &str, client_table_id: i32, host: Option<i32>) {
        let request = InvalidateTable {
            client_table_id,
            host: host.map(|id| HostId::new(id).expect("valid host")),
        };
        self.client(user)
            .send_with(CommandId::InvalidateTable, |out| out.write(&request))
            .expect("send invalidate");
        self.read_reply(user, false).expect("invalidate reply");
    }

    /// Sends an arbitrary ordinal and records the reply.
    pub fn send_ordinal(&mut self, user: &str, ordinal: i32) {
        self.client(user)
            .send_ordinal(ordinal, |_| Ok(()))
            .expect("send ordinal");
        self.read_reply(user, false).expect("reply");
    }

    /// Sends `PING` carrying the wrong sequence number.
    pub fn send_out_of_sequence(&mut self, user: &str) {
        self.client(user)
            .send_raw(Some(-7), CommandId::Ping.ordinal(), |_| Ok(()))
            .expect("send ping");
        self.read_reply(user, false).expect("reply");
    }

    /// Enters `LISTEN_CACHES` and reads the initial frame.
    pub fn listen(&mut self, user: &str) {
        self.client(user)
            .send(CommandId::ListenCaches)
            .expect("send listen");
        self.next_frame(user);
    }

    /// Reads the next pushed frame, acknowledging it when the protocol asks.
    pub fn next_frame(&mut self, user: &str) -> NoticeFrame {
        let client = self.client(user);
        let frame = client.read_frame().expect("notice frame");
        Self::ack_if_required(client, &frame);
        self.frames
            .entry(user.to_owned())
            .or_default()
            .push(frame.clone());
        frame
    }

    /// Frames `user` has received so far, the initial one first.
    #[must_use]
    pub fn frames(&self, user: &str) -> &[NoticeFrame] {
        self.frames.get(user).map(Vec::as_slice).unwrap_or_default()
    }

    fn ack_if_required(client: &mut TestClient, frame: &NoticeFrame) {
        if frame.requires_ack(client.version()) {
            client.acknowledge(true).expect("acknowledge");
        }
    }

    pub fn is_closed(&mut self, user: &str) -> bool {
        self.client(user).is_closed()
    }

    /// Starts a synchronised invalidation of `table` aimed at `user`'s
    /// connection on a background thread.
    pub fn start_sync(&mut self, user: &str, table: TableId) {
        let connector = self.client(user).connector();
        let context = Arc::clone(
            self.running
                .as_ref()
                .expect("master running")
                .context(),
        );
        self.sync = Some(thread::spawn(move || {
            let mut list = InvalidateList::new();
            list.record_all(table);
            context.sync_invalidate(&list, connector)
        }));
    }

    pub fn sync_outcome(&mut self) -> SyncOutcome {
        self.sync
            .take()
            .expect("sync started")
            .join()
            .expect("sync thread")
    }
}

/// Fresh world for a scenario.
#[must_use]
pub fn world() -> RefCell<MasterWorld> {
    RefCell::new(MasterWorld::new())
}

impl Default for MasterWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MasterWorld {
    fn drop(&mut self) {
        self.clients.clear();
        if let Some(running) = self.running.take() {
            let _ = running.stop();
        }
    }
}
