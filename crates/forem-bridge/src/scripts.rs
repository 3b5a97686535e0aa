// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// JavaScript evaluated in the hosted page.

/// Reads the CSRF token the page exposes for same-origin requests.
pub const CSRF_TOKEN: &str = "window.csrfToken";

/// Reads the logged-in user JSON from `<body data-user>` (null when logged out).
pub const USER_DATA: &str = "document.getElementsByTagName('body')[0].getAttribute('data-user')";

/// Builds the instance metadata JSON from the page's `forem:*` meta tags, or
/// null when the page is not a Forem instance.
pub const INSTANCE_METADATA: &str = r#"(function () {
  function meta(name) {
    var el = document.querySelector('meta[property="' + name + '"], meta[name="' + name + '"]');
    return el ? el.getAttribute('content') : null;
  }
  var domain = meta('forem:domain') || window.location.host;
  if (!domain) { return null; }
  return JSON.stringify({ domain: domain, name: meta('forem:name'), logo: meta('forem:logo') });
})()"#;

/// Closes the web podcast player overlay.
pub const CLOSE_PODCAST_UI: &str = "document.getElementById('closebutt').click()";

/// Installs (once per page) an observer that posts to the `body` channel
/// whenever attributes of `<body>` change, plus one initial post.
pub const BODY_MUTATION_OBSERVER: &str = r#"window.ForemMobile = window.ForemMobile || {};
if (!window.ForemMobile.bodyObserver) {
  const callback = function (mutationsList) {
    for (const mutation of mutationsList) {
      if (mutation.type === 'attributes') {
        window.webkit.messageHandlers.body.postMessage({});
        return;
      }
    }
  };
  window.ForemMobile.bodyObserver = new MutationObserver(callback);
  const body = document.getElementsByTagName('body')[0];
  window.ForemMobile.bodyObserver.observe(body, { attributes: true, childList: false, subtree: false });
  window.webkit.messageHandlers.body.postMessage({});
}
null"#;

/// Wrap `javascript` so page errors are logged to the console instead of
/// surfacing in the hosted page's error handlers.
pub fn wrapped(javascript: &str) -> String {
    format!("try {{ {javascript} }} catch (err) {{ console.log(err) }}")
}
