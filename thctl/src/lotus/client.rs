//! Typed Lotus client.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::config::ClientConfig;
use crate::context::CallContext;
use crate::error::{ClientError, ErrorKind, Result};
use crate::types::{BitField, TokenAmount};

use super::endpoint;
use super::retry::{RetryPolicy, RetryingCaller};
use super::transport::{HttpTransport, Transport};
use super::types::{
    Deadline, DeadlineInfo, MinerActorState, MinerInfo, MinerPower, NodeVersion, Partition,
    SectorCount, SectorLocation, SectorNumber, SectorRecord,
};

/// Namespace prefix of every full-node procedure.
const NAMESPACE: &str = "Filecoin";

/// One typed method per remote procedure.
///
/// Every miner-scoped method rejects an empty miner id locally with
/// [`ErrorKind::InvalidParams`] before anything is sent, and passes the
/// trailing tipset key as an explicit `null` (latest head).
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Clone)]
pub struct LotusClient {
    caller: RetryingCaller,
    endpoint: String,
}

impl LotusClient {
    /// Build a client from `config`, resolving the endpoint once.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let url = endpoint::resolve(&config.endpoint)?;
        let transport = HttpTransport::new(url.clone(), config.auth_token.clone(), config.timeout)?;
        Ok(Self {
            caller: RetryingCaller::new(Arc::new(transport), RetryPolicy::new(config.retry_count)),
            endpoint: url,
        })
    }

    /// Build a client over an arbitrary transport.
    pub fn with_transport(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self {
            caller: RetryingCaller::new(transport, policy),
            endpoint: String::new(),
        }
    }

    /// The resolved URL requests are sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn request<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T> {
        let procedure = format!("{NAMESPACE}.{method}");
        let value = self.caller.call(ctx, &procedure, params).await?;
        serde_json::from_value(value).map_err(|e| {
            ClientError::malformed(format!("unexpected {procedure} result: {e}")).with_source(e)
        })
    }

    /// Like [`request`](Self::request), but a `null` result is reported as
    /// [`ErrorKind::NotFound`] with `what` in the message.
    async fn request_existing<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        method: &str,
        params: Vec<Value>,
        what: impl FnOnce() -> String,
    ) -> Result<T> {
        self.request::<Option<T>>(ctx, method, params)
            .await?
            .ok_or_else(|| ClientError::new(ErrorKind::NotFound, format!("{} not found", what())))
    }

    pub async fn version(&self, ctx: &CallContext) -> Result<NodeVersion> {
        self.request(ctx, "Version", vec![]).await
    }

    /// Sectors of `miner`; only active ones when `only_active` is set.
    pub async fn list_sectors(
        &self,
        ctx: &CallContext,
        miner: &str,
        only_active: bool,
    ) -> Result<Vec<SectorRecord>> {
        require_id("miner", miner)?;
        let sectors: Option<Vec<SectorRecord>> = if only_active {
            self.request(ctx, "StateMinerActiveSectors", vec![json!(miner), Value::Null])
                .await?
        } else {
            // Second null is the sector filter: all sectors
            self.request(
                ctx,
                "StateMinerSectors",
                vec![json!(miner), Value::Null, Value::Null],
            )
            .await?
        };
        Ok(sectors.unwrap_or_default())
    }

    pub async fn get_sector_info(
        &self,
        ctx: &CallContext,
        miner: &str,
        sector: SectorNumber,
    ) -> Result<SectorRecord> {
        require_id("miner", miner)?;
        self.request_existing(ctx, "StateSectorGetInfo", sector_params(miner, sector), || {
            format!("sector {sector} of miner {miner}")
        })
        .await
    }

    /// Deadline and partition a sector is proven in.
    pub async fn get_sector_location(
        &self,
        ctx: &CallContext,
        miner: &str,
        sector: SectorNumber,
    ) -> Result<SectorLocation> {
        require_id("miner", miner)?;
        self.request_existing(ctx, "StateSectorPartition", sector_params(miner, sector), || {
            format!("sector {sector} of miner {miner}")
        })
        .await
    }

    /// Termination penalty the sector would incur now.
    pub async fn get_sector_penalty(
        &self,
        ctx: &CallContext,
        miner: &str,
        sector: SectorNumber,
    ) -> Result<TokenAmount> {
        require_id("miner", miner)?;
        self.request(ctx, "StateSectorPenalty", sector_params(miner, sector))
            .await
    }

    pub async fn get_sector_vested(
        &self,
        ctx: &CallContext,
        miner: &str,
        sector: SectorNumber,
    ) -> Result<TokenAmount> {
        require_id("miner", miner)?;
        self.request(ctx, "StateSectorVested", sector_params(miner, sector))
            .await
    }

    pub async fn get_miner_info(&self, ctx: &CallContext, miner: &str) -> Result<MinerInfo> {
        require_id("miner", miner)?;
        self.request(ctx, "StateMinerInfo", miner_params(miner))
            .await
    }

    pub async fn get_miner_power(&self, ctx: &CallContext, miner: &str) -> Result<MinerPower> {
        require_id("miner", miner)?;
        self.request(ctx, "StateMinerPower", miner_params(miner))
            .await
    }

    pub async fn get_miner_available_balance(
        &self,
        ctx: &CallContext,
        miner: &str,
    ) -> Result<TokenAmount> {
        require_id("miner", miner)?;
        self.request(ctx, "StateMinerAvailableBalance", miner_params(miner))
            .await
    }

    pub async fn get_miner_faults(&self, ctx: &CallContext, miner: &str) -> Result<BitField> {
        require_id("miner", miner)?;
        self.request(ctx, "StateMinerFaults", miner_params(miner))
            .await
    }

    pub async fn get_miner_recoveries(&self, ctx: &CallContext, miner: &str) -> Result<BitField> {
        require_id("miner", miner)?;
        self.request(ctx, "StateMinerRecoveries", miner_params(miner))
            .await
    }

    pub async fn get_miner_deadlines(&self, ctx: &CallContext, miner: &str) -> Result<Vec<Deadline>> {
        require_id("miner", miner)?;
        let deadlines: Option<Vec<Deadline>> = self
            .request(ctx, "StateMinerDeadlines", miner_params(miner))
            .await?;
        Ok(deadlines.unwrap_or_default())
    }

    pub async fn get_miner_proving_deadline(
        &self,
        ctx: &CallContext,
        miner: &str,
    ) -> Result<DeadlineInfo> {
        require_id("miner", miner)?;
        self.request(ctx, "StateMinerProvingDeadline", miner_params(miner))
            .await
    }

    pub async fn get_miner_partitions(
        &self,
        ctx: &CallContext,
        miner: &str,
        deadline: u64,
    ) -> Result<Vec<Partition>> {
        require_id("miner", miner)?;
        let partitions: Option<Vec<Partition>> = self
            .request(
                ctx,
                "StateMinerPartitions",
                vec![json!(miner), json!(deadline), Value::Null],
            )
            .await?;
        Ok(partitions.unwrap_or_default())
    }

    pub async fn get_miner_sector_count(
        &self,
        ctx: &CallContext,
        miner: &str,
    ) -> Result<SectorCount> {
        require_id("miner", miner)?;
        self.request(ctx, "StateMinerSectorCount", miner_params(miner))
            .await
    }

    /// Balance fields of the miner actor's on-chain state.
    pub async fn get_miner_state(&self, ctx: &CallContext, miner: &str) -> Result<MinerActorState> {
        require_id("miner", miner)?;
        self.request(ctx, "StateReadState", miner_params(miner))
            .await
    }

    pub async fn get_miner_initial_pledge_collateral(
        &self,
        ctx: &CallContext,
        miner: &str,
        sector: SectorNumber,
    ) -> Result<TokenAmount> {
        require_id("miner", miner)?;
        self.request(
            ctx,
            "StateMinerInitialPledgeCollateral",
            sector_params(miner, sector),
        )
        .await
    }

    pub async fn get_miner_pre_commit_deposit(
        &self,
        ctx: &CallContext,
        miner: &str,
        sector: SectorNumber,
    ) -> Result<TokenAmount> {
        require_id("miner", miner)?;
        self.request(
            ctx,
            "StateMinerPreCommitDepositForPower",
            sector_params(miner, sector),
        )
        .await
    }

    pub async fn get_wallet_balance(&self, ctx: &CallContext, address: &str) -> Result<TokenAmount> {
        require_id("address", address)?;
        self.request(ctx, "WalletBalance", vec![json!(address)])
            .await
    }
}

fn require_id(what: &str, id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(ClientError::invalid_params(format!("{what} id must not be empty")));
    }
    Ok(())
}

fn miner_params(miner: &str) -> Vec<Value> {
    vec![json!(miner), Value::Null]
}

fn sector_params(miner: &str, sector: SectorNumber) -> Vec<Value> {
    vec![json!(miner), json!(sector), Value::Null]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lotus::transport::fake::FakeTransport;
    use test_case::test_case;

    fn client(fake: FakeTransport) -> (LotusClient, Arc<FakeTransport>) {
        let fake = Arc::new(fake);
        (
            LotusClient::with_transport(fake.clone(), RetryPolicy::new(0)),
            fake,
        )
    }

    fn sector_json(number: u64) -> Value {
        json!({
            "SectorNumber": number,
            "SealProof": 8,
            "SealedCID": {"/": "bagboea4b5abc"},
            "DealIDs": [],
            "Activation": 10,
            "Expiration": 20,
            "DealWeight": "0",
            "VerifiedDealWeight": "0",
            "InitialPledge": "100",
            "ExpectedDayReward": "1",
            "ExpectedStoragePledge": "2"
        })
    }

    #[test_case(""; "empty")]
    #[test_case("   "; "whitespace")]
    #[tokio::test]
    async fn empty_miner_sends_nothing(miner: &str) {
        let (client, fake) = client(FakeTransport::new());
        let ctx = CallContext::new();

        let err = client.list_sectors(&ctx, miner, true).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParams);
        let err = client.get_miner_info(&ctx, miner).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParams);
        let err = client.get_sector_info(&ctx, miner, 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParams);
        let err = client.get_wallet_balance(&ctx, miner).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParams);

        assert_eq!(fake.call_count(), 0);
    }

    #[tokio::test]
    async fn list_sectors_params_depend_on_filter() {
        let (client, fake) = client(
            FakeTransport::new()
                .ok("StateMinerActiveSectors", json!([sector_json(1)]))
                .ok("StateMinerSectors", json!(null)),
        );
        let ctx = CallContext::new();

        let active = client.list_sectors(&ctx, "f01234", true).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(
            fake.last_params("StateMinerActiveSectors").unwrap(),
            vec![json!("f01234"), Value::Null]
        );

        let all = client.list_sectors(&ctx, "f01234", false).await.unwrap();
        assert!(all.is_empty());
        assert_eq!(
            fake.last_params("StateMinerSectors").unwrap(),
            vec![json!("f01234"), Value::Null, Value::Null]
        );
    }

    #[tokio::test]
    async fn sector_scoped_calls_pass_number_then_null() {
        let (client, fake) = client(
            FakeTransport::new()
                .ok("StateSectorGetInfo", sector_json(7))
                .ok("StateSectorPenalty", json!("2500000000000000000"))
                .ok("StateMinerPartitions", json!([{"AllSectors": [0, 3]}])),
        );
        let ctx = CallContext::new();

        let sector = client.get_sector_info(&ctx, "f01234", 7).await.unwrap();
        assert_eq!(sector.sector_number, 7);
        assert_eq!(
            fake.last_params("StateSectorGetInfo").unwrap(),
            vec![json!("f01234"), json!(7), Value::Null]
        );

        let penalty = client.get_sector_penalty(&ctx, "f01234", 7).await.unwrap();
        assert_eq!(penalty.to_string(), "2.500000 FIL");

        let partitions = client.get_miner_partitions(&ctx, "f01234", 3).await.unwrap();
        assert_eq!(partitions[0].all_sectors.count(), 3);
        assert_eq!(
            fake.last_params("StateMinerPartitions").unwrap(),
            vec![json!("f01234"), json!(3), Value::Null]
        );
    }

    #[tokio::test]
    async fn wallet_balance_has_no_tipset() {
        let (client, fake) = client(FakeTransport::new().ok("WalletBalance", json!("42")));
        let balance = client
            .get_wallet_balance(&CallContext::new(), "f3abc")
            .await
            .unwrap();
        assert_eq!(balance, TokenAmount::from_atto(ruint::aliases::U256::from(42_u64)));
        assert_eq!(fake.last_params("WalletBalance").unwrap(), vec![json!("f3abc")]);
    }

    #[tokio::test]
    async fn null_sector_is_not_found() {
        let (client, _) = client(
            FakeTransport::new()
                .ok("StateSectorGetInfo", Value::Null)
                .ok("StateSectorPartition", Value::Null),
        );
        let ctx = CallContext::new();

        let err = client.get_sector_info(&ctx, "f01234", 9).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.message().contains("sector 9"));

        let err = client
            .get_sector_location(&ctx, "f01234", 9)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn wrong_shape_is_malformed() {
        let (client, _) = client(FakeTransport::new().ok("StateMinerPower", json!([1, 2, 3])));
        let err = client
            .get_miner_power(&CallContext::new(), "f01234")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    }

    #[tokio::test]
    async fn errors_pass_through_unchanged() {
        let (client, _) =
            client(FakeTransport::new().fail("StateMinerInfo", ErrorKind::Authentication));
        let err = client
            .get_miner_info(&CallContext::new(), "f01234")
            .await
            .unwrap_err();
        assert!(err.is_auth_error());
    }

    #[test]
    fn new_resolves_multiaddr_once() {
        let config = ClientConfig {
            endpoint: "/ip4/127.0.0.1/tcp/1234/http".into(),
            ..ClientConfig::default()
        };
        let client = LotusClient::new(&config).unwrap();
        assert_eq!(client.endpoint(), "http://127.0.0.1:1234/rpc/v0");
    }

    #[test]
    fn new_rejects_bad_endpoint() {
        let config = ClientConfig {
            endpoint: "nonsense".into(),
            ..ClientConfig::default()
        };
        let err = LotusClient::new(&config).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }
}
