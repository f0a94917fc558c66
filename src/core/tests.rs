//! Cross-module scenarios for the rule engine
//!
//! Unit tests for each piece live next to it; these drive the public
//! operations in sequence the way the CLI does.

#[cfg(test)]
mod tests_impl {
    use crate::core::error::{Error, StructuralError};
    use crate::core::ops::{close, list, open, status};
    use crate::core::rule::{PortRule, Proto};
    use crate::core::test_helpers::{BASE_RULES, HEADERS_ONLY, UNBALANCED_BLOCK, WITH_BLOCK};

    fn lines_of(content: &str) -> Vec<&str> {
        content.split('\n').collect()
    }

    #[test]
    fn test_open_then_close_keeps_empty_block() {
        let opened = open(HEADERS_ONLY, 8080, "tcp/udp").unwrap();
        assert!(opened.changed);
        assert_eq!(
            list(&opened.content).unwrap(),
            vec![
                PortRule::new(8080, Proto::Tcp),
                PortRule::new(8080, Proto::Udp)
            ]
        );

        let closed = close(&opened.content, 8080, "tcp/udp").unwrap();
        assert!(closed.changed);
        assert!(list(&closed.content).unwrap().is_empty());
        assert!(closed.content.contains("#PORTMAN BEGIN\n#PORTMAN END"));
    }

    #[test]
    fn test_open_is_idempotent() {
        let first = open(BASE_RULES, 3306, "tcp").unwrap();
        let second = open(&first.content, 3306, "tcp").unwrap();

        assert!(!second.changed);
        assert_eq!(second.content, first.content);
    }

    #[test]
    fn test_close_only_touches_requested_proto() {
        let closed = close(WITH_BLOCK, 3307, "udp").unwrap();

        assert!(closed.changed);
        assert_eq!(list(&closed.content).unwrap(), vec![PortRule::new(3307, Proto::Tcp)]);
        let status = status(&closed.content, 3307, "tcp/udp").unwrap();
        assert!(status[&Proto::Tcp]);
        assert!(!status[&Proto::Udp]);
    }

    #[test]
    fn test_rule_outside_block_is_open_but_not_closable() {
        // BASE_RULES carries a hand-written 22/tcp accept outside any block
        let status = status(BASE_RULES, 22, "tcp").unwrap();
        assert!(status[&Proto::Tcp]);

        let closed = close(BASE_RULES, 22, "tcp").unwrap();
        assert!(!closed.changed);
        assert!(list(BASE_RULES).unwrap().is_empty());
    }

    #[test]
    fn test_open_existing_outside_rule_still_creates_block() {
        let opened = open(BASE_RULES, 22, "tcp").unwrap();

        assert!(opened.changed);
        assert!(list(&opened.content).unwrap().is_empty());
        let lines = lines_of(&opened.content);
        let begin = lines.iter().position(|l| *l == "#PORTMAN BEGIN").unwrap();
        assert_eq!(lines[begin + 1], "#PORTMAN END");
        assert_eq!(lines[begin - 1], ":OUTPUT ACCEPT [0:0]");
    }

    #[test]
    fn test_block_lands_after_chain_headers() {
        let opened = open(BASE_RULES, 3306, "tcp").unwrap();
        let lines = lines_of(&opened.content);

        let begin = lines.iter().position(|l| *l == "#PORTMAN BEGIN").unwrap();
        assert_eq!(lines[begin - 1], ":OUTPUT ACCEPT [0:0]");
        assert_eq!(lines[begin + 1], "-A INPUT -p tcp -m tcp --dport 3306 -j ACCEPT");
        assert_eq!(lines[begin + 2], "#PORTMAN END");
        assert_eq!(lines[begin + 3], "-A INPUT -i lo -j ACCEPT");
    }

    #[test]
    fn test_list_after_many_opens_is_sorted() {
        let mut content = HEADERS_ONLY.to_string();
        for (port, proto) in [(443, "tcp"), (53, "udp"), (80, "tcp"), (53, "tcp")] {
            content = open(&content, port, proto).unwrap().content;
        }

        let listed: Vec<String> = list(&content)
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(listed, vec!["53/tcp", "53/udp", "80/tcp", "443/tcp"]);
    }

    #[test]
    fn test_crlf_input_normalized_on_write() {
        let crlf = HEADERS_ONLY.replace('\n', "\r\n");
        let opened = open(&crlf, 25, "tcp").unwrap();

        assert!(opened.changed);
        assert!(!opened.content.contains('\r'));
        assert_eq!(list(&opened.content).unwrap(), vec![PortRule::new(25, Proto::Tcp)]);
    }

    #[test]
    fn test_every_operation_rejects_unbalanced_block() {
        let expect_unbalanced = |result: Result<(), Error>| {
            assert!(matches!(
                result,
                Err(Error::Structural(StructuralError::UnbalancedBlock))
            ));
        };

        expect_unbalanced(open(UNBALANCED_BLOCK, 80, "tcp").map(|_| ()));
        expect_unbalanced(close(UNBALANCED_BLOCK, 80, "tcp").map(|_| ()));
        expect_unbalanced(list(UNBALANCED_BLOCK).map(|_| ()));
        // status never inspects the block
        assert!(status(UNBALANCED_BLOCK, 80, "tcp").is_ok());
    }

    #[test]
    fn test_validation_precedes_structure() {
        let err = open("no filter here", 0, "tcp").unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));

        let err = close("no filter here", 80, "icmp").unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }
}

#[cfg(test)]
mod property_tests {
    use crate::core::ops::{close, list, open, status};
    use crate::core::rule::{PortRule, Proto};
    use crate::core::test_helpers::{BASE_RULES, HEADERS_ONLY, WITH_BLOCK};
    use proptest::prelude::*;

    fn proto_spec() -> impl Strategy<Value = &'static str> {
        prop_oneof![Just("tcp"), Just("udp"), Just("tcp/udp"), Just("UDP/TCP")]
    }

    fn base_document() -> impl Strategy<Value = &'static str> {
        prop_oneof![Just(BASE_RULES), Just(HEADERS_ONLY), Just(WITH_BLOCK)]
    }

    proptest! {
        #[test]
        fn open_twice_changes_nothing(
            base in base_document(),
            port in 1u32..=65_535,
            spec in proto_spec(),
        ) {
            let once = open(base, port, spec).unwrap();
            let twice = open(&once.content, port, spec).unwrap();
            prop_assert!(!twice.changed);
            prop_assert_eq!(twice.content, once.content);
        }

        #[test]
        fn opened_ports_report_open(
            base in base_document(),
            port in 1u32..=65_535,
            spec in proto_spec(),
        ) {
            let opened = open(base, port, spec).unwrap();
            let report = status(&opened.content, port, spec).unwrap();
            prop_assert!(report.values().all(|open| *open));
        }

        #[test]
        fn close_undoes_open_inside_block(
            port in 1u32..=65_535,
            spec in proto_spec(),
        ) {
            let opened = open(HEADERS_ONLY, port, spec).unwrap();
            let closed = close(&opened.content, port, spec).unwrap();

            prop_assert!(closed.changed);
            prop_assert!(list(&closed.content).unwrap().is_empty());
            let report = status(&closed.content, port, spec).unwrap();
            prop_assert!(report.values().all(|open| !*open));
        }

        #[test]
        fn list_is_sorted_and_unique(ports in prop::collection::vec((1u16..=65_535, any::<bool>()), 0..12)) {
            let mut content = HEADERS_ONLY.to_string();
            for (port, tcp) in &ports {
                let spec = if *tcp { "tcp" } else { "udp" };
                content = open(&content, u32::from(*port), spec).unwrap().content;
            }

            let listed = list(&content).unwrap();
            prop_assert!(listed.windows(2).all(|pair| pair[0] < pair[1]));

            let mut expected: Vec<PortRule> = ports
                .iter()
                .map(|&(port, tcp)| PortRule::new(port, if tcp { Proto::Tcp } else { Proto::Udp }))
                .collect();
            expected.sort();
            expected.dedup();
            prop_assert_eq!(listed, expected);
        }

        #[test]
        fn out_of_range_ports_rejected(port in prop_oneof![Just(0u32), 65_536u32..=u32::MAX]) {
            prop_assert!(open(HEADERS_ONLY, port, "tcp").is_err());
            prop_assert!(close(WITH_BLOCK, port, "tcp").is_err());
            prop_assert!(status(HEADERS_ONLY, port, "tcp").is_err());
        }
    }
}
