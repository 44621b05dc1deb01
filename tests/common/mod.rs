// SPDX-License-Identifier: MIT

//! In-process fake RouterOS API server
//!
//! Speaks just enough of the binary API for the adapter flows: login (both
//! plaintext and the legacy MD5 challenge), address-list print/add/remove
//! with query filters, and the identity/resource/routerboard prints.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;

use catwaf_router_sync::{encode_sentence, RouterConfig, RouterType};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

pub const USERNAME: &str = "catwaf";
pub const PASSWORD: &str = "secret";

#[derive(Debug, Clone)]
pub struct FakeEntry {
    pub id: String,
    pub address: String,
    pub list: String,
    pub comment: String,
    pub timeout: Option<String>,
}

#[derive(Default)]
pub struct FakeState {
    pub entries: Vec<FakeEntry>,
    next_id: u64,
    /// Accepted TCP connections
    pub connections: u64,
    /// `/ip/firewall/address-list/add` commands received
    pub add_commands: u64,
    /// `/ip/firewall/address-list/remove` commands received
    pub remove_commands: u64,
    /// Addresses whose add command traps
    pub fail_add_for: HashSet<String>,
    /// Trap every login attempt
    pub reject_login: bool,
    /// Answer the first login with an MD5 challenge (pre-6.43 behavior)
    pub legacy_login: bool,
    /// Trap `/system/routerboard/print` (CHR behavior)
    pub routerboard_traps: bool,
}

impl FakeState {
    pub fn preload(&mut self, address: &str, list: &str, comment: &str) {
        self.next_id += 1;
        self.entries.push(FakeEntry {
            id: format!("*{}", self.next_id),
            address: address.to_string(),
            list: list.to_string(),
            comment: comment.to_string(),
            timeout: None,
        });
    }

    pub fn addresses(&self) -> Vec<String> {
        let mut out: Vec<String> = self.entries.iter().map(|e| e.address.clone()).collect();
        out.sort();
        out
    }
}

pub struct FakeRouter {
    pub addr: SocketAddr,
    pub state: Arc<Mutex<FakeState>>,
}

impl FakeRouter {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(FakeState::default()));

        let accept_state = state.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                accept_state.lock().await.connections += 1;
                let conn_state = accept_state.clone();
                tokio::spawn(async move {
                    let _ = handle_connection(stream, conn_state).await;
                });
            }
        });

        Self { addr, state }
    }

    /// Router record pointing at this fake
    pub fn config(&self, id: i64) -> RouterConfig {
        RouterConfig {
            id,
            router_type: RouterType::Mikrotik,
            name: format!("fake-{id}"),
            host: self.addr.ip().to_string(),
            port: Some(self.addr.port()),
            use_tls: false,
            verify_tls: false,
            username: USERNAME.to_string(),
            password: PASSWORD.to_string(),
            address_list: "catwaf-banned".to_string(),
            whitelist: vec![],
            dry_run: false,
            comment_prefix: "catwaf".to_string(),
            enabled: true,
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    state: Arc<Mutex<FakeState>>,
) -> std::io::Result<()> {
    let mut pending_challenge: Option<Vec<u8>> = None;

    while let Some(sentence) = read_sentence(&mut stream).await? {
        let Some(command) = sentence.first().cloned() else {
            continue;
        };

        let mut attrs: HashMap<String, String> = HashMap::new();
        let mut queries: HashMap<String, String> = HashMap::new();
        for word in &sentence[1..] {
            if let Some(rest) = word.strip_prefix('=') {
                if let Some((k, v)) = rest.split_once('=') {
                    attrs.insert(k.to_string(), v.to_string());
                }
            } else if let Some(rest) = word.strip_prefix('?') {
                if let Some((k, v)) = rest.split_once('=') {
                    queries.insert(k.to_string(), v.to_string());
                }
            } else if word.starts_with('.') {
                if let Some((k, v)) = word.split_once('=') {
                    attrs.insert(k.to_string(), v.to_string());
                }
            }
        }

        let reply = dispatch(&command, &attrs, &queries, &state, &mut pending_challenge).await;
        for sentence in reply {
            stream.write_all(&encode_sentence(&sentence)).await?;
        }
    }
    Ok(())
}

async fn dispatch(
    command: &str,
    attrs: &HashMap<String, String>,
    queries: &HashMap<String, String>,
    state: &Arc<Mutex<FakeState>>,
    pending_challenge: &mut Option<Vec<u8>>,
) -> Vec<Vec<String>> {
    let mut state = state.lock().await;
    match command {
        "/login" => {
            if state.reject_login {
                return vec![
                    vec![
                        "!trap".to_string(),
                        "=message=invalid user name or password (6)".to_string(),
                    ],
                    vec!["!done".to_string()],
                ];
            }
            if let Some(response) = attrs.get("response") {
                // second leg of the legacy exchange
                let challenge = pending_challenge.take().unwrap_or_default();
                let mut data = Vec::new();
                data.push(0u8);
                data.extend_from_slice(PASSWORD.as_bytes());
                data.extend_from_slice(&challenge);
                let expected = format!("00{}", hex::encode(md5::compute(&data).0));
                if *response == expected {
                    return vec![vec!["!done".to_string()]];
                }
                return vec![
                    vec![
                        "!trap".to_string(),
                        "=message=invalid user name or password (6)".to_string(),
                    ],
                    vec!["!done".to_string()],
                ];
            }
            if state.legacy_login {
                let challenge: Vec<u8> = (1u8..=16).collect();
                let ret = format!("=ret={}", hex::encode(&challenge));
                *pending_challenge = Some(challenge);
                return vec![vec!["!done".to_string(), ret]];
            }
            vec![vec!["!done".to_string()]]
        }

        "/ip/firewall/address-list/print" => {
            let mut reply: Vec<Vec<String>> = state
                .entries
                .iter()
                .filter(|e| queries.get("list").is_none_or(|l| *l == e.list))
                .filter(|e| queries.get("address").is_none_or(|a| *a == e.address))
                .map(|e| {
                    let mut words = vec![
                        "!re".to_string(),
                        format!("=.id={}", e.id),
                        format!("=address={}", e.address),
                        format!("=list={}", e.list),
                        format!("=comment={}", e.comment),
                        "=dynamic=false".to_string(),
                    ];
                    if let Some(t) = &e.timeout {
                        words.push(format!("=timeout={t}"));
                    }
                    words
                })
                .collect();
            reply.push(vec!["!done".to_string()]);
            reply
        }

        "/ip/firewall/address-list/add" => {
            state.add_commands += 1;
            let address = attrs.get("address").cloned().unwrap_or_default();
            if state.fail_add_for.contains(&address) {
                return vec![
                    vec![
                        "!trap".to_string(),
                        "=message=failure: simulated add failure".to_string(),
                    ],
                    vec!["!done".to_string()],
                ];
            }
            state.next_id += 1;
            let id = format!("*{}", state.next_id);
            state.entries.push(FakeEntry {
                id: id.clone(),
                address,
                list: attrs.get("list").cloned().unwrap_or_default(),
                comment: attrs.get("comment").cloned().unwrap_or_default(),
                timeout: attrs.get("timeout").cloned(),
            });
            vec![vec!["!done".to_string(), format!("=ret={id}")]]
        }

        "/ip/firewall/address-list/remove" => {
            state.remove_commands += 1;
            let id = attrs.get(".id").cloned().unwrap_or_default();
            let before = state.entries.len();
            state.entries.retain(|e| e.id != id);
            if state.entries.len() == before {
                return vec![
                    vec!["!trap".to_string(), "=message=no such item".to_string()],
                    vec!["!done".to_string()],
                ];
            }
            vec![vec!["!done".to_string()]]
        }

        "/system/identity/print" => vec![
            vec!["!re".to_string(), "=name=fake-router".to_string()],
            vec!["!done".to_string()],
        ],

        "/system/resource/print" => vec![
            vec![
                "!re".to_string(),
                "=version=7.15.3 (stable)".to_string(),
                "=board-name=CHR".to_string(),
                "=uptime=1d2h3m".to_string(),
                "=cpu-load=3".to_string(),
                "=free-memory=104857600".to_string(),
                "=total-memory=268435456".to_string(),
            ],
            vec!["!done".to_string()],
        ],

        "/system/routerboard/print" => {
            if state.routerboard_traps {
                return vec![
                    vec![
                        "!trap".to_string(),
                        "=message=not supported".to_string(),
                    ],
                    vec!["!done".to_string()],
                ];
            }
            vec![
                vec![
                    "!re".to_string(),
                    "=model=RB5009UG+S+".to_string(),
                    "=serial-number=HC1234567890".to_string(),
                ],
                vec!["!done".to_string()],
            ]
        }

        other => vec![
            vec![
                "!trap".to_string(),
                format!("=message=no such command {other}"),
            ],
            vec!["!done".to_string()],
        ],
    }
}

/// Reads one sentence; None on a clean EOF between sentences
async fn read_sentence(stream: &mut TcpStream) -> std::io::Result<Option<Vec<String>>> {
    let mut words = Vec::new();
    loop {
        let len = match read_length(stream).await {
            Ok(len) => len,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof && words.is_empty() => {
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        if len == 0 {
            return Ok(Some(words));
        }
        let mut buf = vec![0u8; len];
        stream.read_exact(&mut buf).await?;
        words.push(String::from_utf8_lossy(&buf).into_owned());
    }
}

/// Client words in these tests never exceed the 2-byte length form
async fn read_length(stream: &mut TcpStream) -> std::io::Result<usize> {
    let first = stream.read_u8().await?;
    if first & 0x80 == 0 {
        Ok(first as usize)
    } else if first & 0xC0 == 0x80 {
        let second = stream.read_u8().await?;
        Ok((((first & 0x3F) as usize) << 8) | second as usize)
    } else {
        Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("unexpected length prefix {first:#04X}"),
        ))
    }
}
