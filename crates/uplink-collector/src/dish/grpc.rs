//! Dish gRPC transport.
//!
//! The vendor schema is not shipped. The primary path asks the server's
//! reflection service for the file descriptors containing the device
//! service, builds the request as a dynamic message with the wanted oneof
//! variant set to an empty embedded message, and decodes the response
//! through the same descriptors. When reflection is unavailable, a
//! hand-crafted minimal request (one length-delimited empty message at the
//! variant's field number) is sent and the raw response bytes are walked
//! without descriptors.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use prost::Message;
use prost_reflect::{DescriptorPool, DynamicMessage, MessageDescriptor};
use prost_types::{FileDescriptorProto, FileDescriptorSet};
use serde_json::Value;
use tonic::client::Grpc;
use tonic::codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder};
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};
use tonic::Status;
use tonic_reflection::pb::v1alpha::server_reflection_client::ServerReflectionClient;
use tonic_reflection::pb::v1alpha::server_reflection_request::MessageRequest;
use tonic_reflection::pb::v1alpha::server_reflection_response::MessageResponse;
use tonic_reflection::pb::v1alpha::ServerReflectionRequest;
use uplink_common::{CollectorError, Ctx, DishConfig, Result};

use super::wire;

pub(crate) const SERVICE: &str = "SpaceX.API.Device.Device";
pub(crate) const METHOD: &str = "Handle";
const METHOD_PATH: &str = "/SpaceX.API.Device.Device/Handle";

/// Request oneof variants and their wire tags for the descriptor-less path.
pub(crate) const GET_STATUS: (&str, u32) = ("get_status", 1);
pub(crate) const GET_DEVICE_INFO: (&str, u32) = ("get_device_info", 3);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const CALL_TIMEOUT: Duration = Duration::from_secs(5);

async fn connect(ctx: &Ctx, cfg: &DishConfig) -> Result<Channel> {
    let endpoint = Endpoint::from_shared(cfg.grpc_target())
        .map_err(|e| CollectorError::TransportUnavailable(format!("grpc endpoint: {e}")))?
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(CALL_TIMEOUT);
    ctx.run(endpoint.connect())
        .await?
        .map_err(|e| CollectorError::TransportUnavailable(format!("grpc connect: {e}")))
}

/// Fetch one API variant via reflection-discovered descriptors. Returns the
/// response serialized to its JSON mapping.
pub(crate) async fn fetch_dynamic(
    ctx: &Ctx,
    cfg: &DishConfig,
    variant: (&str, u32),
) -> Result<Value> {
    let channel = connect(ctx, cfg).await?;
    let pool = discover_descriptors(ctx, channel.clone()).await?;

    let service = pool
        .get_service_by_name(SERVICE)
        .ok_or_else(|| CollectorError::Protocol(format!("{SERVICE} missing from descriptors")))?;
    let method = service
        .methods()
        .find(|m| m.name() == METHOD)
        .ok_or_else(|| CollectorError::Protocol(format!("{SERVICE} has no {METHOD} method")))?;

    let input = method.input();
    let request = build_variant_request(&input, variant)?;

    let mut grpc = Grpc::new(channel);
    ctx.run(grpc.ready())
        .await?
        .map_err(|e| CollectorError::TransportUnavailable(format!("grpc not ready: {e}")))?;

    let codec = DynamicCodec::new(method.output());
    let path = PathAndQuery::from_static(METHOD_PATH);
    let response = ctx
        .run(grpc.unary(tonic::Request::new(request), path, codec))
        .await?
        .map_err(|e| CollectorError::TransportUnavailable(format!("grpc call: {e}")))?;

    serde_json::to_value(response.into_inner())
        .map_err(|e| CollectorError::Protocol(format!("response to JSON: {e}")))
}

/// Build the request message with the wanted variant set to an empty
/// embedded message. Lookup is by field name first, then by the known tag.
fn build_variant_request(
    input: &MessageDescriptor,
    (name, tag): (&str, u32),
) -> Result<DynamicMessage> {
    let field = input
        .get_field_by_name(name)
        .or_else(|| input.get_field(tag))
        .ok_or_else(|| {
            CollectorError::Protocol(format!("request type has no {name} variant (tag {tag})"))
        })?;
    let embedded = field.kind().as_message().cloned().ok_or_else(|| {
        CollectorError::Protocol(format!("{name} variant is not an embedded message"))
    })?;

    let mut request = DynamicMessage::new(input.clone());
    request.set_field(
        &field,
        prost_reflect::Value::Message(DynamicMessage::new(embedded)),
    );
    Ok(request)
}

/// Pull the file descriptors containing the device service symbol.
async fn discover_descriptors(ctx: &Ctx, channel: Channel) -> Result<DescriptorPool> {
    let mut client = ServerReflectionClient::new(channel);
    let request = ServerReflectionRequest {
        host: String::new(),
        message_request: Some(MessageRequest::FileContainingSymbol(SERVICE.to_string())),
    };

    let response = ctx
        .run(client.server_reflection_info(futures::stream::iter(vec![request])))
        .await?
        .map_err(|e| CollectorError::TransportUnavailable(format!("reflection: {e}")))?;

    let mut stream = response.into_inner();
    let mut files = Vec::new();
    loop {
        let message = ctx
            .run(stream.message())
            .await?
            .map_err(|e| CollectorError::Protocol(format!("reflection stream: {e}")))?;
        let Some(message) = message else { break };
        match message.message_response {
            Some(MessageResponse::FileDescriptorResponse(descriptors)) => {
                for raw in descriptors.file_descriptor_proto {
                    let file = FileDescriptorProto::decode(raw.as_slice()).map_err(|e| {
                        CollectorError::Protocol(format!("file descriptor: {e}"))
                    })?;
                    files.push(file);
                }
            }
            Some(MessageResponse::ErrorResponse(err)) => {
                return Err(CollectorError::Protocol(format!(
                    "reflection error {}: {}",
                    err.error_code, err.error_message
                )));
            }
            _ => {}
        }
    }
    if files.is_empty() {
        return Err(CollectorError::Protocol(
            "reflection returned no descriptors".into(),
        ));
    }
    DescriptorPool::from_file_descriptor_set(FileDescriptorSet { file: files })
        .map_err(|e| CollectorError::Protocol(format!("descriptor pool: {e}")))
}

/// Result of the descriptor-less raw call.
pub(crate) struct RawFetch {
    pub value: Value,
    pub heuristic: bool,
}

/// Invoke `Handle` with a hand-crafted minimal request and parse the raw
/// response bytes by walking wire-format fields, falling back to the
/// heuristic float scan.
pub(crate) async fn fetch_raw(ctx: &Ctx, cfg: &DishConfig, variant: (&str, u32)) -> Result<RawFetch> {
    let mut request = BytesMut::with_capacity(4);
    prost::encoding::encode_key(
        variant.1,
        prost::encoding::WireType::LengthDelimited,
        &mut request,
    );
    prost::encoding::encode_varint(0, &mut request);

    let channel = connect(ctx, cfg).await?;
    let mut grpc = Grpc::new(channel);
    ctx.run(grpc.ready())
        .await?
        .map_err(|e| CollectorError::TransportUnavailable(format!("grpc not ready: {e}")))?;

    let path = PathAndQuery::from_static(METHOD_PATH);
    let response = ctx
        .run(grpc.unary(tonic::Request::new(request.freeze()), path, RawCodec))
        .await?
        .map_err(|e| CollectorError::TransportUnavailable(format!("raw grpc call: {e}")))?;
    let bytes = response.into_inner();

    if let Some(map) = wire::status_from_wire(&bytes) {
        return Ok(RawFetch {
            value: Value::Object(map),
            heuristic: false,
        });
    }
    match wire::heuristic_scan(&bytes) {
        Some(map) => Ok(RawFetch {
            value: Value::Object(map),
            heuristic: true,
        }),
        None => Err(CollectorError::Protocol(
            "raw response yielded no recognizable fields".into(),
        )),
    }
}

// ── Codecs ──────────────────────────────────────────────────────────

/// Codec over dynamic messages: encodes the reflection-built request,
/// decodes the response through the discovered output descriptor.
#[derive(Clone)]
struct DynamicCodec {
    output: MessageDescriptor,
}

impl DynamicCodec {
    fn new(output: MessageDescriptor) -> Self {
        DynamicCodec { output }
    }
}

impl Codec for DynamicCodec {
    type Encode = DynamicMessage;
    type Decode = DynamicMessage;
    type Encoder = DynamicEncoder;
    type Decoder = DynamicDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        DynamicEncoder
    }

    fn decoder(&mut self) -> Self::Decoder {
        DynamicDecoder {
            output: self.output.clone(),
        }
    }
}

struct DynamicEncoder;

impl Encoder for DynamicEncoder {
    type Item = DynamicMessage;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> std::result::Result<(), Status> {
        item.encode(dst)
            .map_err(|e| Status::internal(format!("encode request: {e}")))
    }
}

struct DynamicDecoder {
    output: MessageDescriptor,
}

impl Decoder for DynamicDecoder {
    type Item = DynamicMessage;
    type Error = Status;

    fn decode(
        &mut self,
        src: &mut DecodeBuf<'_>,
    ) -> std::result::Result<Option<Self::Item>, Status> {
        let message = DynamicMessage::decode(self.output.clone(), src)
            .map_err(|e| Status::internal(format!("decode response: {e}")))?;
        Ok(Some(message))
    }
}

/// Pass-through codec for the descriptor-less path.
#[derive(Clone, Copy)]
struct RawCodec;

impl Codec for RawCodec {
    type Encode = Bytes;
    type Decode = Bytes;
    type Encoder = RawEncoder;
    type Decoder = RawDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        RawEncoder
    }

    fn decoder(&mut self) -> Self::Decoder {
        RawDecoder
    }
}

struct RawEncoder;

impl Encoder for RawEncoder {
    type Item = Bytes;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> std::result::Result<(), Status> {
        use bytes::BufMut;
        dst.put(item);
        Ok(())
    }
}

struct RawDecoder;

impl Decoder for RawDecoder {
    type Item = Bytes;
    type Error = Status;

    fn decode(
        &mut self,
        src: &mut DecodeBuf<'_>,
    ) -> std::result::Result<Option<Self::Item>, Status> {
        use bytes::Buf;
        let len = src.remaining();
        Ok(Some(src.copy_to_bytes(len)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_raw_request_encoding() {
        // get_status (field 1, length-delimited, empty): tag 0x0a, length 0
        let mut buf = BytesMut::new();
        prost::encoding::encode_key(
            GET_STATUS.1,
            prost::encoding::WireType::LengthDelimited,
            &mut buf,
        );
        prost::encoding::encode_varint(0, &mut buf);
        assert_eq!(&buf[..], &[0x0a, 0x00]);
    }

    #[tokio::test]
    async fn unreachable_dish_is_transport_unavailable() {
        let cfg = DishConfig {
            api_host: "127.0.0.1".into(),
            api_port: 1,
            ..DishConfig::default()
        };
        let ctx = Ctx::with_timeout(Duration::from_secs(2));
        let err = fetch_dynamic(&ctx, &cfg, GET_STATUS).await.unwrap_err();
        assert!(matches!(
            err,
            CollectorError::TransportUnavailable(_) | CollectorError::Timeout(_)
        ));
    }
}
