//! In-process gateway used by the integration tests.

#![allow(dead_code)]

use bytes::{Bytes, BytesMut};
use hbrpc_protocol::codec::decode_message;
use hbrpc_protocol::{
    ApplicationErrorKind, ApplicationException, ArgWriter, Encoder, Frame, MessageDecoder,
    MessageHeader, Mutation, ProtocolError, ProtocolKind, ProtocolReader, ReadValue, Scan, TType,
    FRAME_HEADER_SIZE, MAX_MESSAGE_SIZE,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Arguments of one decoded call, grouped by wire type.
#[derive(Debug, Default)]
pub struct Args {
    pub text: HashMap<i16, Bytes>,
    pub ints: HashMap<i16, i64>,
    pub lists: HashMap<i16, Vec<Bytes>>,
    pub mutations: HashMap<i16, Vec<Mutation>>,
    pub maps: HashMap<i16, HashMap<Bytes, Bytes>>,
    pub scan: Option<Scan>,
}

impl Args {
    pub fn text(&self, id: i16) -> &[u8] {
        self.text.get(&id).map(|b| &b[..]).unwrap_or_default()
    }

    pub fn int(&self, id: i16) -> i64 {
        self.ints.get(&id).copied().unwrap_or_default()
    }

    fn read(r: &mut dyn ProtocolReader) -> Result<Self, ProtocolError> {
        let mut args = Args::default();
        r.read_struct_begin()?;
        loop {
            let field = r.read_field_begin()?;
            if field.is_stop() {
                break;
            }
            match field.field_type {
                TType::Binary => {
                    args.text.insert(field.id, r.read_binary()?);
                }
                TType::I32 => {
                    args.ints.insert(field.id, r.read_i32()? as i64);
                }
                TType::I64 => {
                    args.ints.insert(field.id, r.read_i64()?);
                }
                TType::Struct => args.scan = Some(Scan::read(r)?),
                TType::List => {
                    let (elem, size) = r.read_list_begin()?;
                    if elem == TType::Struct {
                        let mut items = Vec::new();
                        for _ in 0..size {
                            items.push(Mutation::read(r)?);
                        }
                        args.mutations.insert(field.id, items);
                    } else {
                        let mut items = Vec::new();
                        for _ in 0..size {
                            items.push(r.read_binary()?);
                        }
                        args.lists.insert(field.id, items);
                    }
                }
                TType::Map => {
                    let (_, _, size) = r.read_map_begin()?;
                    let mut map = HashMap::new();
                    for _ in 0..size {
                        let k = r.read_binary()?;
                        let v = r.read_binary()?;
                        map.insert(k, v);
                    }
                    args.maps.insert(field.id, map);
                }
                other => hbrpc_protocol::protocol::skip(r, other)?,
            }
        }
        r.read_struct_end()?;
        Ok(args)
    }
}

/// One call received by the gateway.
pub struct Call {
    pub protocol: ProtocolKind,
    pub header: MessageHeader,
    pub args: Args,
}

impl Call {
    pub fn method(&self) -> &str {
        &self.header.name
    }

    /// Encodes a reply whose result struct is written by `result`.
    pub fn reply<F>(&self, result: F) -> BytesMut
    where
        F: FnOnce(&mut ArgWriter<'_>) -> Result<(), ProtocolError>,
    {
        Encoder::encode_reply(self.protocol, &self.header.name, self.header.seqid, result)
            .unwrap()
    }

    pub fn exception(&self, kind: ApplicationErrorKind, message: &str) -> BytesMut {
        Encoder::encode_exception(
            self.protocol,
            &self.header.name,
            self.header.seqid,
            &ApplicationException::new(kind, message),
        )
        .unwrap()
    }
}

pub type Handler = Arc<dyn Fn(Call) -> Option<BytesMut> + Send + Sync>;

/// Delay applied before answering the n-th call (counted from 1).
pub type Delay = Arc<dyn Fn(usize) -> Duration + Send + Sync>;

/// A gateway listening on a loopback port.
pub struct MockGateway {
    pub port: u16,
    calls: Arc<AtomicUsize>,
}

impl MockGateway {
    /// Starts a gateway. A handler returning `None` leaves the call
    /// unanswered.
    pub async fn start<H>(protocol: ProtocolKind, framed: bool, handler: H) -> Self
    where
        H: Fn(Call) -> Option<BytesMut> + Send + Sync + 'static,
    {
        Self::start_delayed(protocol, framed, |_| Duration::ZERO, handler).await
    }

    /// Starts a gateway that holds each reply back by `delay(n)`.
    pub async fn start_delayed<D, H>(
        protocol: ProtocolKind,
        framed: bool,
        delay: D,
        handler: H,
    ) -> Self
    where
        D: Fn(usize) -> Duration + Send + Sync + 'static,
        H: Fn(Call) -> Option<BytesMut> + Send + Sync + 'static,
    {
        let delay: Delay = Arc::new(delay);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let calls = Arc::new(AtomicUsize::new(0));
        let handler: Handler = Arc::new(handler);

        let counter = calls.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let handler = handler.clone();
                let delay = delay.clone();
                let counter = counter.clone();
                tokio::spawn(serve(stream, protocol, framed, handler, delay, counter));
            }
        });

        Self { port, calls }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Decodes one request message and runs the handler on it.
pub fn dispatch(
    protocol: ProtocolKind,
    request: Bytes,
    handler: &(dyn Fn(Call) -> Option<BytesMut> + Send + Sync),
) -> Option<BytesMut> {
    let (header, mut reader) = decode_message(protocol, request, MAX_MESSAGE_SIZE).unwrap();
    let args = Args::read(reader.as_mut()).unwrap();
    handler(Call {
        protocol,
        header,
        args,
    })
}

async fn serve(
    mut stream: TcpStream,
    protocol: ProtocolKind,
    framed: bool,
    handler: Handler,
    delay: Delay,
    calls: Arc<AtomicUsize>,
) {
    let mut decoder = MessageDecoder::new(protocol, MAX_MESSAGE_SIZE);
    let mut buf = vec![0u8; 4096];

    loop {
        let request = if framed {
            let mut header = [0u8; FRAME_HEADER_SIZE];
            if stream.read_exact(&mut header).await.is_err() {
                return;
            }
            let len = Frame::payload_len(header, MAX_MESSAGE_SIZE).unwrap();
            let mut payload = vec![0u8; len];
            if stream.read_exact(&mut payload).await.is_err() {
                return;
            }
            Bytes::from(payload)
        } else {
            loop {
                if let Some(message) = decoder.next_message().unwrap() {
                    break message;
                }
                let n = stream.read(&mut buf).await.unwrap_or(0);
                if n == 0 {
                    return;
                }
                decoder.extend(&buf[..n]);
            }
        };

        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        let Some(reply) = dispatch(protocol, request, handler.as_ref()) else {
            continue;
        };
        let wait = delay(n);
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }

        let out = if framed {
            Frame::new(reply.freeze()).encode(MAX_MESSAGE_SIZE).unwrap()
        } else {
            reply
        };
        if stream.write_all(&out).await.is_err() {
            return;
        }
    }
}
