//! Typed management operations built on the engine, CBOR codec and SID
//! table (§4.6).

use std::ops::Add;
use std::time::Duration;

use bytes::Bytes;
use vdsp_core::{connection::ConnectionState, env::Environment, transport::Transport};
use vdsp_proto::{
    cbor::{self, CborValue},
    coap::{
        Block1Splitter, Block2Reassembler, BlockOption, Code, CoapOption, Message, MessageType,
        content_format, option_number, uri_path_options,
    },
};
use vdsp_sid::SidTable;

use crate::{config::Config, engine::Engine, error::FacadeError, tsn};

/// Switch model inferred from the populated port count (§4.6 `identify()`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Model {
    /// LAN9662, 2 ports.
    Lan9662,
    /// LAN9668, 8 ports.
    Lan9668,
    /// LAN9692, 12 ports.
    Lan9692,
    /// Port count did not match a known model; not a failure (§4.6).
    Unknown,
}

/// Result of [`ManagementFacade::identify`].
#[derive(Debug, Clone)]
pub struct IdentifyResult {
    /// Value of `/ietf-constrained-yang-library:yang-library/checksum`.
    pub checksum: String,
    /// Number of entries under `/ietf-interfaces:interfaces/interface`.
    pub interface_count: usize,
    /// Model inferred from `interface_count`.
    pub model: Model,
}

/// Typed management operations over one device (§4.6).
pub struct ManagementFacade<T, E>
where
    T: Transport,
    E: Environment,
{
    engine: Engine<T, E>,
    sids: SidTable,
}

impl<T, E> ManagementFacade<T, E>
where
    T: Transport,
    E: Environment,
    E::Instant: Add<Duration, Output = E::Instant>,
{
    /// Builds a facade over `transport`, using the embedded SID table
    /// (§4.4).
    pub fn new(transport: T, env: E, config: Config) -> Self {
        Self::with_sid_table(transport, env, config, SidTable::embedded())
    }

    /// Builds a facade with a caller-supplied SID table, e.g. one extended
    /// beyond the embedded vendor slice.
    pub fn with_sid_table(transport: T, env: E, config: Config, sids: SidTable) -> Self {
        Self { engine: Engine::new(transport, env, config), sids }
    }

    /// Current connection state (§4.7).
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.engine.connection_state()
    }

    /// Connects to the device (§4.7).
    ///
    /// # Errors
    ///
    /// See [`Engine::connect`].
    pub async fn connect(&mut self) -> Result<(), FacadeError> {
        self.engine.connect().await
    }

    /// Issues a standalone diagnostic ping (§4.6 `ping()`).
    ///
    /// # Errors
    ///
    /// See [`Engine::ping`].
    pub async fn ping(&mut self) -> Result<(), FacadeError> {
        self.engine.ping().await
    }

    /// Identifies the device: reads the YANG library checksum and the
    /// interface count, inferring the switch model (§4.6 `identify()`).
    ///
    /// # Errors
    ///
    /// Propagates any [`FacadeError`] from the underlying `yang_get` calls.
    pub async fn identify(&mut self) -> Result<IdentifyResult, FacadeError> {
        let checksum_value =
            self.yang_get("/ietf-constrained-yang-library:yang-library/checksum").await?;
        let checksum = match checksum_value {
            CborValue::Text(s) => s,
            other => format!("{other:?}"),
        };

        let interfaces_value = self.yang_get("/ietf-interfaces:interfaces").await?;
        let interface_count = interface_count(&interfaces_value);

        let model = match interface_count {
            2 => Model::Lan9662,
            8 => Model::Lan9668,
            12 => Model::Lan9692,
            _ => Model::Unknown,
        };

        Ok(IdentifyResult { checksum, interface_count, model })
    }

    /// `GET` a YANG instance path, decoding the response as CBOR and
    /// reassembling any Block2 transfer (§4.6, §8 scenario D).
    ///
    /// # Errors
    ///
    /// See [`Engine::exchange`]; [`vdsp_proto::ProtocolError`] wrapped as
    /// [`vdsp_core::CoreError::ParseError`] on malformed CBOR or a malformed
    /// Block2 option.
    pub async fn yang_get(&mut self, path: &str) -> Result<CborValue, FacadeError> {
        let request = self.build_request(Code::GET, path, content_format::YANG_DATA_CBOR, Bytes::new());
        let payload = self.run_with_block2(request).await?;
        Ok(cbor::decode(&payload, &self.sids).map_err(vdsp_core::CoreError::from)?)
    }

    /// `PUT` a CBOR-encoded value at a YANG instance path (§4.6).
    ///
    /// # Errors
    ///
    /// See [`Engine::exchange`].
    pub async fn yang_set(&mut self, path: &str, value: &CborValue) -> Result<(), FacadeError> {
        let payload = cbor::encode(value, &self.sids).map_err(vdsp_core::CoreError::from)?;
        let request =
            self.build_request(Code::PUT, path, content_format::YANG_DATA_CBOR, Bytes::from(payload));
        self.engine.exchange(request).await?;
        Ok(())
    }

    /// `DELETE` a YANG instance path (§4.6).
    ///
    /// # Errors
    ///
    /// See [`Engine::exchange`].
    pub async fn yang_delete(&mut self, path: &str) -> Result<(), FacadeError> {
        let request = self.build_request(Code::DELETE, path, content_format::YANG_DATA_CBOR, Bytes::new());
        self.engine.exchange(request).await?;
        Ok(())
    }

    /// Invokes a YANG `rpc`/`action` path with optional CBOR parameters
    /// (§4.6 `yang_rpc()`).
    ///
    /// # Errors
    ///
    /// See [`Engine::exchange`].
    pub async fn yang_rpc(
        &mut self,
        path: &str,
        params: Option<&CborValue>,
    ) -> Result<CborValue, FacadeError> {
        let payload = match params {
            Some(value) => cbor::encode(value, &self.sids).map_err(vdsp_core::CoreError::from)?,
            None => Vec::new(),
        };
        let request =
            self.build_request(Code::POST, path, content_format::YANG_DATA_CBOR, Bytes::from(payload));
        let payload = self.run_with_block2(request).await?;
        if payload.is_empty() {
            return Ok(CborValue::Null);
        }
        Ok(cbor::decode(&payload, &self.sids).map_err(vdsp_core::CoreError::from)?)
    }

    /// Saves the running configuration to startup (§4.6 `save_config()`).
    ///
    /// # Errors
    ///
    /// See [`Self::yang_rpc`].
    pub async fn save_config(&mut self) -> Result<(), FacadeError> {
        self.yang_rpc("/mchp-velocitysp-system:save-startup-config", None).await?;
        Ok(())
    }

    /// Resets the device (§4.6 `reset()`).
    ///
    /// # Errors
    ///
    /// See [`Self::yang_rpc`].
    pub async fn reset(&mut self) -> Result<(), FacadeError> {
        self.yang_rpc("/mchp-velocitysp-system:reset", None).await?;
        Ok(())
    }

    /// Streams a firmware image to the device over Block1, one CoAP `PUT`
    /// per block (§4.6 `firmware_update()`). `on_progress(blocks_sent,
    /// total_blocks)` is called after each block is acknowledged.
    ///
    /// # Errors
    ///
    /// See [`Engine::exchange`].
    pub async fn firmware_update(
        &mut self,
        blob: &[u8],
        mut on_progress: impl FnMut(u32, u32),
    ) -> Result<(), FacadeError> {
        let block_size = self.engine.config().block_size;
        let splitter = Block1Splitter::new(blob, block_size);
        let total = splitter.num_blocks();

        for index in 0..total {
            let Some((chunk, block1)) = splitter.block(index) else { continue };
            let mut options = uri_path_options("mchp-velocitysp-firmware:firmware-upgrade");
            options.push(CoapOption::content_format(content_format::CBOR));
            options.push(CoapOption { number: option_number::BLOCK1, value: block1.encode() });

            let request = Message {
                msg_type: MessageType::Con,
                code: Code::PUT,
                message_id: 0,
                token: Bytes::new(),
                options,
                payload: Bytes::copy_from_slice(chunk),
            };
            self.engine.exchange(request).await?;
            on_progress(index + 1, total);
        }
        Ok(())
    }

    /// Sets a TAS gate-parameter-table at `path` (§4.6).
    ///
    /// # Errors
    ///
    /// See [`Self::yang_set`].
    pub async fn configure_tas_gate_parameter_table(
        &mut self,
        path: &str,
        cycle_time: tsn::CycleTime,
        admin_base_time: u64,
        control_list: &[tsn::GateControlEntry],
    ) -> Result<(), FacadeError> {
        let value = tsn::gate_parameter_table(cycle_time, admin_base_time, control_list);
        self.yang_set(path, &value).await
    }

    /// Sets a CBS idle-slope at `path` (§4.6).
    ///
    /// # Errors
    ///
    /// See [`Self::yang_set`].
    pub async fn configure_cbs_idle_slope(
        &mut self,
        path: &str,
        idle_slope: u32,
    ) -> Result<(), FacadeError> {
        let value = tsn::cbs_idle_slope(idle_slope);
        self.yang_set(path, &value).await
    }

    /// Sets a PTP instance `default-ds` at `path` (§4.6).
    ///
    /// # Errors
    ///
    /// See [`Self::yang_set`].
    pub async fn configure_ptp_default_ds(
        &mut self,
        path: &str,
        domain_number: u8,
        priority1: u8,
        priority2: u8,
    ) -> Result<(), FacadeError> {
        let value = tsn::ptp_default_ds(domain_number, priority1, priority2);
        self.yang_set(path, &value).await
    }

    fn build_request(&self, code: Code, path: &str, format: u16, payload: Bytes) -> Message {
        let format_option = CoapOption::content_format(format);
        let mut options = uri_path_options(path);
        if code == Code::GET {
            options.push(CoapOption { number: option_number::ACCEPT, value: format_option.value.clone() });
        }
        options.push(format_option);
        Message {
            msg_type: MessageType::Con,
            code,
            message_id: 0,
            token: Bytes::new(),
            options,
            payload,
        }
    }

    /// Runs `request`, following up with incrementing `Block2` requests
    /// while the response reports `M=1`, and returns the concatenated
    /// payload (§4.2, §8 scenario D).
    async fn run_with_block2(&mut self, mut request: Message) -> Result<Bytes, FacadeError> {
        let mut reassembler = Block2Reassembler::new();
        let mut next_block = 0u32;

        loop {
            let response = self.engine.exchange(request.clone()).await?;
            let block2 = response
                .options
                .iter()
                .find(|o| o.number == option_number::BLOCK2)
                .map(|o| BlockOption::decode(&o.value))
                .transpose()
                .map_err(vdsp_core::CoreError::from)?;

            let Some(block) = block2 else {
                return Ok(response.payload);
            };

            reassembler.accept(block, &response.payload).map_err(vdsp_core::CoreError::from)?;
            if reassembler.is_complete() {
                return Ok(reassembler.into_payload());
            }

            next_block += 1;
            request.options.retain(|o| o.number != option_number::BLOCK2);
            request.options.push(CoapOption {
                number: option_number::BLOCK2,
                value: BlockOption { num: next_block, more: false, szx: block.szx }.encode(),
            });
        }
    }
}

fn interface_count(interfaces: &CborValue) -> usize {
    let CborValue::Map(entries) = interfaces else { return 0 };
    entries
        .iter()
        .find(|(key, _)| key.ends_with("/interface") || key == "interface")
        .map(|(_, value)| match value {
            CborValue::Array(items) => items.len(),
            _ => 0,
        })
        .unwrap_or(0)
}
