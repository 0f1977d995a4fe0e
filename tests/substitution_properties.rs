use proptest::prelude::*;
use stratus_deploy::deploy::substitution::render;
use stratus_deploy::deploy::SubstitutionMap;

fn token() -> impl Strategy<Value = String> {
    "[A-Z_]{1,12}".prop_map(|name| format!("${{{name}}}"))
}

fn variables() -> impl Strategy<Value = SubstitutionMap> {
    prop::collection::btree_map(token(), "[a-z0-9:/.-]{0,24}", 0..6)
}

proptest! {
    #[test]
    fn empty_map_leaves_content_untouched(content in prop::collection::vec(any::<u8>(), 0..512)) {
        prop_assert_eq!(render(&SubstitutionMap::new(), &content), content);
    }

    #[test]
    fn content_without_tokens_is_untouched(
        vars in variables(),
        content in "[a-z0-9 <>/=\"\n]{0,256}",
    ) {
        prop_assert_eq!(render(&vars, content.as_bytes()), content.as_bytes().to_vec());
    }

    #[test]
    fn rendering_twice_changes_nothing(
        vars in variables(),
        pieces in prop::collection::vec(("[a-z ]{0,16}", any::<prop::sample::Index>()), 0..8),
    ) {
        let tokens: Vec<&String> = vars.keys().collect();
        let mut content = String::new();
        for (text, index) in &pieces {
            content.push_str(text);
            if !tokens.is_empty() {
                content.push_str(tokens[index.index(tokens.len())]);
            }
        }

        let once = render(&vars, content.as_bytes());
        let twice = render(&vars, &once);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn every_known_token_is_replaced(vars in variables(), prefix in "[a-z ]{0,16}") {
        let mut content = prefix.clone();
        for token in vars.keys() {
            content.push_str(token);
            content.push(' ');
        }

        let rendered = String::from_utf8(render(&vars, content.as_bytes())).unwrap();
        for token in vars.keys() {
            prop_assert!(!rendered.contains(token.as_str()));
        }
    }
}
