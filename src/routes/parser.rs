// Platform-specific `show ip route` parsers

use super::{Platform, RouteRecord};
use crate::error::{AppError, AppResult};

/// The one command every device is polled with
pub const SHOW_ROUTES: &str = "show ip route";

/// Parse raw command output into route records for the given platform
pub fn parse_output(platform: Platform, command: &str, raw: &str) -> AppResult<Vec<RouteRecord>> {
    if command.trim() != SHOW_ROUTES {
        return Err(AppError::TemplateNotFound {
            platform: platform.to_string(),
            command: command.to_string(),
        });
    }

    Ok(match platform {
        Platform::CiscoIos => parse_ios(raw),
        Platform::CiscoNxos => parse_nxos(raw),
    })
}

fn parse_ios(raw: &str) -> Vec<RouteRecord> {
    let mut routes = Vec::new();
    // Mask from a classful "is subnetted" header, applied to child lines without one
    let mut subnet_mask: Option<String> = None;
    // Last route line seen, reused by ECMP continuation lines
    let mut template: Option<RouteRecord> = None;

    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty()
            || trimmed.starts_with("Codes:")
            || trimmed.starts_with("Gateway of last resort")
            || trimmed.contains(" - ")
        {
            continue;
        }

        if trimmed.contains("subnetted") {
            subnet_mask = if trimmed.contains("variably") {
                None
            } else {
                trimmed
                    .split_whitespace()
                    .next()
                    .and_then(|prefix| prefix.split_once('/'))
                    .map(|(_, mask)| mask.to_string())
            };
            continue;
        }

        if trimmed.starts_with('[') {
            if let Some(base) = &template {
                let mut route = base.clone();
                fill_ios_nexthop(&mut route, trimmed);
                routes.push(route);
            }
            continue;
        }

        let tokens: Vec<&str> = trimmed.split_whitespace().collect();
        let starts_with_code = tokens
            .first()
            .and_then(|t| t.chars().next())
            .is_some_and(|c| c.is_ascii_alphabetic());
        if line.starts_with(char::is_whitespace) || !starts_with_code {
            continue;
        }

        let mut route = RouteRecord::for_platform(Platform::CiscoIos);

        // "O", "S*", "O*E2" or a separate type token ("O IA", "D EX", "i L1")
        let code = tokens[0];
        let (protocol, mut route_type) = match code.split_once('*') {
            Some((protocol, rest)) => (protocol, rest),
            None => (code.trim_end_matches(['+', '%']), ""),
        };
        let mut idx = 1;
        if let Some(next) = tokens.get(1) {
            if !next.starts_with(|c: char| c.is_ascii_digit()) {
                route_type = *next;
                idx = 2;
            }
        }
        route.set("protocol", protocol);
        route.set("type", route_type);

        let Some(prefix) = tokens.get(idx) else {
            continue;
        };
        match prefix.split_once('/') {
            Some((network, mask)) => {
                route.set("network", network);
                route.set("mask", mask);
            }
            None => {
                route.set("network", *prefix);
                route.set("mask", subnet_mask.clone().unwrap_or_default());
            }
        }

        let rest = tokens[idx + 1..].join(" ");
        if rest.is_empty() {
            // Next hop wrapped onto the following line
            template = Some(route);
            continue;
        }

        fill_ios_nexthop(&mut route, &rest);
        template = Some(route.clone());
        routes.push(route);
    }

    routes
}

/// Fill distance, metric, next hop and interface from the tail of an IOS route line:
/// "[110/2] via 10.0.0.1, 00:01:02, GigabitEthernet0/0" or "is directly connected, Gi0/0"
fn fill_ios_nexthop(route: &mut RouteRecord, tail: &str) {
    route.set("distance", "");
    route.set("metric", "");
    route.set("nexthop_ip", "");
    route.set("nexthop_if", "");

    let segments: Vec<&str> = tail.split(',').map(str::trim).collect();
    let head: Vec<&str> = segments[0].split_whitespace().collect();

    for (i, token) in head.iter().enumerate() {
        if let Some((distance, metric)) = parse_preference(token) {
            route.set("distance", distance);
            route.set("metric", metric);
        } else if *token == "via" {
            if let Some(nexthop) = head.get(i + 1) {
                route.set("nexthop_ip", *nexthop);
            }
        }
    }

    if let Some(last) = segments.iter().skip(1).last() {
        if last.starts_with(|c: char| c.is_ascii_alphabetic()) {
            route.set("nexthop_if", *last);
        }
    }
}

fn parse_nxos(raw: &str) -> Vec<RouteRecord> {
    let mut routes = Vec::new();
    let mut vrf = String::from("default");
    let mut prefix: Option<(String, String)> = None;

    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('\'') {
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix("IP Route Table for VRF") {
            vrf = rest.trim().trim_matches('"').to_string();
            continue;
        }

        if trimmed.contains("ubest/mbest") {
            prefix = trimmed
                .split(',')
                .next()
                .map(|p| match p.split_once('/') {
                    Some((network, mask)) => (network.to_string(), mask.to_string()),
                    None => (p.to_string(), String::new()),
                });
            continue;
        }

        let Some(via) = trimmed
            .strip_prefix("*via ")
            .or_else(|| trimmed.strip_prefix("via "))
        else {
            continue;
        };
        let Some((network, mask)) = &prefix else {
            continue;
        };

        let mut route = RouteRecord::for_platform(Platform::CiscoNxos);
        route.set("vrf", vrf.as_str());
        route.set("network", network.as_str());
        route.set("mask", mask.as_str());

        let mut segments = via.split(',').map(str::trim);
        if let Some(nexthop) = segments.next() {
            // "192.0.2.1%default" names the VRF the next hop lives in
            let nexthop = nexthop.split('%').next().unwrap_or(nexthop);
            route.set("nexthop_ip", nexthop);
        }

        // [iface,] [d/m], age, protocol[, type][, tag N]
        let mut after_preference = Vec::new();
        let mut seen_preference = false;
        for segment in segments {
            if let Some((distance, metric)) = parse_preference(segment) {
                route.set("distance", distance);
                route.set("metric", metric);
                seen_preference = true;
            } else if !seen_preference {
                route.set("nexthop_if", segment);
            } else {
                after_preference.push(segment);
            }
        }
        if let Some(protocol) = after_preference.get(1) {
            route.set("protocol", *protocol);
        }
        if let Some(route_type) = after_preference.get(2) {
            if !route_type.starts_with("tag") {
                route.set("type", *route_type);
            }
        }

        routes.push(route);
    }

    routes
}

/// "[110/41]" or "[110/41]," into ("110", "41")
fn parse_preference(token: &str) -> Option<(&str, &str)> {
    token
        .trim_end_matches(',')
        .strip_prefix('[')?
        .strip_suffix(']')?
        .split_once('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    const IOS_OUTPUT: &str = r#"Codes: L - local, C - connected, S - static, R - RIP, M - mobile, B - BGP
       D - EIGRP, EX - EIGRP external, O - OSPF, IA - OSPF inter area
       + - replicated route, % - next hop override

Gateway of last resort is 10.0.0.1 to network 0.0.0.0

S*    0.0.0.0/0 [1/0] via 10.0.0.1
      10.0.0.0/8 is variably subnetted, 2 subnets, 2 masks
C        10.0.0.0/24 is directly connected, GigabitEthernet0/0
L        10.0.0.2/32 is directly connected, GigabitEthernet0/0
      172.16.0.0/24 is subnetted, 2 subnets
O IA     172.16.1.0 [110/2] via 10.0.0.3, 00:01:02, GigabitEthernet0/0
D        172.16.2.0 [90/156160] via 10.0.0.4, 00:00:10, GigabitEthernet0/1
                    [90/156160] via 10.0.0.5, 00:00:10, GigabitEthernet0/2
O E2     192.168.100.0/24
           [110/20] via 10.0.0.3, 2d01h, GigabitEthernet0/0
B        203.0.113.0/24 [20/0] via 192.0.2.1, 1w2d
"#;

    const NXOS_OUTPUT: &str = r#"IP Route Table for VRF "default"
'*' denotes best ucast next-hop
'**' denotes best mcast next-hop
'[x/y]' denotes [preference/metric]

0.0.0.0/0, ubest/mbest: 1/0
    *via 10.1.1.1, [1/0], 2d01h, static
10.0.0.0/24, ubest/mbest: 1/0, attached
    *via 10.0.0.2, Eth1/1, [0/0], 1d02h, direct
172.16.0.0/16, ubest/mbest: 2/0
    *via 10.0.0.5, Eth1/2, [110/41], 3d, ospf-1, intra
    *via 10.0.0.6, Eth1/3, [110/41], 3d, ospf-1, intra

IP Route Table for VRF "mgmt"
198.51.100.0/24, ubest/mbest: 1/0
    *via 192.0.2.1%default, [20/0], 1w2d, bgp-65000, external, tag 65001
"#;

    fn find<'a>(routes: &'a [RouteRecord], network: &str) -> Vec<&'a RouteRecord> {
        routes.iter().filter(|r| r.get("network") == Some(network)).collect()
    }

    #[test]
    fn test_unknown_command_has_no_template() {
        let result = parse_output(Platform::CiscoIos, "show ip interface brief", "");
        assert!(matches!(result, Err(AppError::TemplateNotFound { .. })));
    }

    #[test]
    fn test_parse_ios_routes() {
        let routes = parse_output(Platform::CiscoIos, SHOW_ROUTES, IOS_OUTPUT).unwrap();
        assert_eq!(routes.len(), 8);
        assert!(routes.iter().all(|r| r.matches_schema(Platform::CiscoIos)));

        let default = find(&routes, "0.0.0.0")[0];
        assert_eq!(default.get("protocol"), Some("S"));
        assert_eq!(default.get("mask"), Some("0"));
        assert_eq!(default.get("distance"), Some("1"));
        assert_eq!(default.get("nexthop_ip"), Some("10.0.0.1"));
        assert_eq!(default.get("nexthop_if"), Some(""));

        let connected = find(&routes, "10.0.0.0")[0];
        assert_eq!(connected.get("protocol"), Some("C"));
        assert_eq!(connected.get("nexthop_if"), Some("GigabitEthernet0/0"));
        assert_eq!(connected.get("nexthop_ip"), Some(""));

        let inter_area = find(&routes, "172.16.1.0")[0];
        assert_eq!(inter_area.get("type"), Some("IA"));
        assert_eq!(inter_area.get("mask"), Some("24"));
        assert_eq!(inter_area.get("metric"), Some("2"));

        let bgp = find(&routes, "203.0.113.0")[0];
        assert_eq!(bgp.get("nexthop_ip"), Some("192.0.2.1"));
        assert_eq!(bgp.get("nexthop_if"), Some(""));
    }

    #[test]
    fn test_parse_ios_ecmp_and_wrapped_lines() {
        let routes = parse_output(Platform::CiscoIos, SHOW_ROUTES, IOS_OUTPUT).unwrap();

        let eigrp = find(&routes, "172.16.2.0");
        assert_eq!(eigrp.len(), 2);
        assert_eq!(eigrp[0].get("nexthop_ip"), Some("10.0.0.4"));
        assert_eq!(eigrp[1].get("nexthop_ip"), Some("10.0.0.5"));
        assert_eq!(eigrp[1].get("nexthop_if"), Some("GigabitEthernet0/2"));
        assert_eq!(eigrp[1].get("mask"), Some("24"));
        assert_eq!(eigrp[1].get("protocol"), Some("D"));

        let external = find(&routes, "192.168.100.0");
        assert_eq!(external.len(), 1);
        assert_eq!(external[0].get("type"), Some("E2"));
        assert_eq!(external[0].get("metric"), Some("20"));
        assert_eq!(external[0].get("nexthop_if"), Some("GigabitEthernet0/0"));
    }

    #[test]
    fn test_parse_nxos_routes() {
        let routes = parse_output(Platform::CiscoNxos, SHOW_ROUTES, NXOS_OUTPUT).unwrap();
        assert_eq!(routes.len(), 5);
        assert!(routes.iter().all(|r| r.matches_schema(Platform::CiscoNxos)));

        let default = find(&routes, "0.0.0.0")[0];
        assert_eq!(default.get("vrf"), Some("default"));
        assert_eq!(default.get("protocol"), Some("static"));
        assert_eq!(default.get("nexthop_if"), Some(""));

        let ospf = find(&routes, "172.16.0.0");
        assert_eq!(ospf.len(), 2);
        assert_eq!(ospf[1].get("nexthop_if"), Some("Eth1/3"));
        assert_eq!(ospf[1].get("distance"), Some("110"));
        assert_eq!(ospf[1].get("metric"), Some("41"));
        assert_eq!(ospf[1].get("protocol"), Some("ospf-1"));
        assert_eq!(ospf[1].get("type"), Some("intra"));

        let bgp = find(&routes, "198.51.100.0")[0];
        assert_eq!(bgp.get("vrf"), Some("mgmt"));
        assert_eq!(bgp.get("nexthop_ip"), Some("192.0.2.1"));
        assert_eq!(bgp.get("type"), Some("external"));
    }

    #[test]
    fn test_parse_preference() {
        assert_eq!(parse_preference("[110/41],"), Some(("110", "41")));
        assert_eq!(parse_preference("via"), None);
    }
}
