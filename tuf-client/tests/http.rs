// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Drives a full refresh over a real HTTP server (`httptest`), the same shape of test the teacher
//! runs for its `HttpTransport`/`DefaultTransport` impls, adapted to this crate's synchronous API.

mod support;

#[cfg(feature = "http")]
mod http_happy {
    use super::support::*;
    use hex_literal::hex;
    use httptest::{matchers::*, responders::*, Expectation, Server};
    use maplit::hashmap;
    use std::str::FromStr;
    use tuf_client::{DefaultTransport, HttpTransport, Repository, Settings, Transport};
    use url::Url;

    fn serve(server: &Server, path: &str, bytes: Vec<u8>) {
        server.expect(
            Expectation::matching(request::method_path("GET", format!("/{path}")))
                .respond_with(status_code(200).body(bytes)),
        );
    }

    fn run_against<T: Transport>(transport: T) {
        let signer = new_signer();
        let server = Server::run();

        let root = build_root(&signer, 1, in_one_hour());
        let root_bytes = root_bytes(&root, &signer);

        let contents = b"served over http";
        // Pinned so an edit to `contents` above can't silently drift from the fixture's hashed
        // on-disk filename without a test failure pointing at this line.
        let expected_digest =
            hex!("219ac1ff9099cb6055ba25b9338e558f182f412481879044eab5716abd2f30e0");
        let digest = sha256_hex(contents);
        assert_eq!(digest.as_ref(), expected_digest.as_slice());
        let hashed_name = format!("{}.file.bin", hex::encode(&digest));

        let targets = build_targets(
            1,
            in_one_hour(),
            vec![("file.bin", target_file(contents.len() as u64, digest))],
            None,
        );
        let snapshot = build_snapshot(1, in_one_hour(), &[("targets.json", 1)]);
        let timestamp = build_timestamp(1, in_one_hour(), 1);

        let served = hashmap! {
            "metadata/timestamp.json" => sign_and_wrap(&timestamp, &[&signer]),
            "metadata/1.snapshot.json" => sign_and_wrap(&snapshot, &[&signer]),
            "metadata/1.targets.json" => sign_and_wrap(&targets, &[&signer]),
        };
        for (path, bytes) in served {
            serve(&server, path, bytes);
        }
        serve(&server, &format!("targets/{hashed_name}"), contents.to_vec());
        server.expect(
            Expectation::matching(request::method_path("GET", "/metadata/2.root.json"))
                .respond_with(status_code(404)),
        );

        let metadata_root_url = Url::from_str(&server.url_str("/metadata")).unwrap();
        let targets_root_url = Url::from_str(&server.url_str("/targets")).unwrap();
        let targets_cache = tempfile::tempdir().unwrap();

        let settings = Settings {
            root: root_bytes.as_slice(),
            metadata_root_url: metadata_root_url.as_str(),
            targets_root_url: targets_root_url.as_str(),
            metadata_cache_dir: None,
            targets_cache_dir: targets_cache.path(),
            limits: tuf_client::Limits::default(),
            expiration_enforcement: tuf_client::ExpirationEnforcement::Safe,
        };
        let mut repo = Repository::load(transport, settings).unwrap();

        let found = repo.get("file.bin").unwrap();
        assert_eq!(std::fs::read(&found.local_path).unwrap(), contents);
    }

    #[test]
    fn fetches_over_http_transport() {
        run_against(HttpTransport::default());
    }

    #[test]
    fn fetches_over_default_transport() {
        run_against(DefaultTransport::default());
    }
}
