use shipsync_core::TenantId;
use shipsync_shipping::TenantContext;

/// Tenant a request acts for, resolved from the `x-tenant-id` header.
///
/// Immutable and present on every `/shipping` and `/sales` route.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestTenant {
    ctx: TenantContext,
}

impl RequestTenant {
    pub fn new(ctx: TenantContext) -> Self {
        Self { ctx }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.ctx.tenant_id
    }

    pub fn context(&self) -> &TenantContext {
        &self.ctx
    }
}
