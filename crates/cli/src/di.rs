use std::net::SocketAddr;
use std::sync::Arc;
use tlspol_application::ports::{PolicySource, PolicyStore};
use tlspol_application::use_cases::{
    QueryPolicyUseCase, RefreshPoliciesUseCase, ResolvePolicyUseCase,
};
use tlspol_domain::Config;
use tlspol_infrastructure::cache::PolicyCache;
use tlspol_infrastructure::dane::DaneResolver;
use tlspol_infrastructure::dns::{DnsExchange, UdpDnsClient};
use tlspol_infrastructure::mta_sts::MtaStsResolver;
use tlspol_infrastructure::socketmap::SocketmapHandler;

/// Wires the dependency graph: DNS client → resolvers → use cases → handler.
pub struct Services {
    pub store: Arc<PolicyCache>,
    pub handler: Arc<SocketmapHandler>,
    pub refresh: Arc<RefreshPoliciesUseCase>,
}

impl Services {
    pub fn build(config: &Config, dns_address: SocketAddr) -> anyhow::Result<Self> {
        let dns: Arc<dyn DnsExchange> = Arc::new(UdpDnsClient::new(dns_address));

        let dane: Arc<dyn PolicySource> = Arc::new(DaneResolver::new(Arc::clone(&dns)));
        let mta_sts: Arc<dyn PolicySource> = Arc::new(MtaStsResolver::new(Arc::clone(&dns))?);
        let resolver = Arc::new(ResolvePolicyUseCase::new(dane, mta_sts));

        let store = match &config.server.cache_file {
            Some(path) => PolicyCache::persistent(path.into()),
            None => PolicyCache::in_memory(),
        };
        let store_port: Arc<dyn PolicyStore> = store.clone();

        let query = Arc::new(QueryPolicyUseCase::new(
            Arc::clone(&store_port),
            Arc::clone(&resolver),
        ));
        let handler = Arc::new(SocketmapHandler::new(
            query,
            Arc::clone(&resolver),
            Arc::clone(&store_port),
            config.server.tlsrpt,
        ));
        let refresh = Arc::new(RefreshPoliciesUseCase::new(store_port, resolver));

        Ok(Self {
            store,
            handler,
            refresh,
        })
    }
}
