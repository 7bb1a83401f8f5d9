//! Static role → permission policy.

use crate::{Permission, Role};

const READ: &str = "procurement.read";

const REQUESTER: &[&str] = &[READ, "mrs.create", "mrs.submit", "mrs.cancel"];

const BUYER: &[&str] = &[
    READ,
    "mrs.cancel",
    "suppliers.manage",
    "rfqs.manage",
    "quotes.submit",
    "quotes.withdraw",
    "quote_packs.create",
    "quote_approvals.request",
    "pos.send",
    "pos.acknowledge",
    "pos.receive",
    "pos.close",
    "pos.cancel",
];

const APPROVER: &[&str] = &[READ, "quote_approvals.decide", "prs.decide"];

const SUPPLIER_PORTAL: &[&str] = &["quotes.submit", "quotes.withdraw", "pos.acknowledge"];

/// Resolve the effective permissions granted by a set of roles.
///
/// `admin` grants the wildcard. Unknown roles grant nothing (they may still
/// appear as approval-matrix levels).
pub fn permissions_for_roles(roles: &[Role]) -> Vec<Permission> {
    if roles.iter().any(Role::is_admin) {
        return vec![Permission::new("*")];
    }

    let mut out: Vec<Permission> = Vec::new();
    for role in roles {
        let granted: &[&'static str] = match role.as_str() {
            "requester" => REQUESTER,
            "buyer" => BUYER,
            "procurement_manager" => {
                push_all(&mut out, BUYER);
                APPROVER
            }
            "finance_manager" | "director" => APPROVER,
            "supplier_portal" => SUPPLIER_PORTAL,
            _ => &[],
        };
        push_all(&mut out, granted);
    }
    out
}

fn push_all(out: &mut Vec<Permission>, names: &[&'static str]) {
    for name in names {
        let perm = Permission::new(*name);
        if !out.contains(&perm) {
            out.push(perm);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn procurement_manager_inherits_buyer_permissions() {
        let perms = permissions_for_roles(&[Role::PROCUREMENT_MANAGER]);
        assert!(perms.contains(&Permission::new("rfqs.manage")));
        assert!(perms.contains(&Permission::new("prs.decide")));
    }

    #[test]
    fn permissions_are_deduplicated() {
        let perms = permissions_for_roles(&[Role::BUYER, Role::REQUESTER]);
        let reads = perms.iter().filter(|p| p.as_str() == READ).count();
        assert_eq!(reads, 1);
    }
}
