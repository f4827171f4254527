//! `NOTIFY` request validation and propertyset parsing

use soap_client::http::{
    HttpRequest, HttpResponse, Status, CONNECTION, CONTENT_LENGTH, NOTIFY, NT, NTS,
    PRODUCT_TOKENS, SEQ, SERVER, SID, UPNP_EVENT, UPNP_PROPCHANGE,
};
use tracing::warn;
use xmltree::Element;

use crate::router::{EventRouter, NotificationPayload};

/// Check the GENA `NT` and `NTS` headers of an event notification.
///
/// Both must be present, with `upnp:event` and `upnp:propchange`.
pub fn validate_upnp_headers(nt: Option<&str>, nts: Option<&str>) -> bool {
    matches!(
        (nt.map(str::trim), nts.map(str::trim)),
        (Some(UPNP_EVENT), Some(UPNP_PROPCHANGE))
    )
}

/// Answer one callback request, routing it when it is an acceptable event
pub fn handle_request(request: &HttpRequest, router: &EventRouter) -> HttpResponse {
    let status = process(request, router);
    if status != Status::Ok {
        warn!(
            "rejected {} {} from SID {:?}: {}",
            request.method(),
            request.uri(),
            request.header(SID),
            status
        );
    }

    let mut response = HttpResponse::new(status);
    response.set_header(SERVER, PRODUCT_TOKENS);
    response.set_header(CONNECTION, "close");
    response.set_header(CONTENT_LENGTH, "0");
    response
}

fn process(request: &HttpRequest, router: &EventRouter) -> Status {
    if !request.method().eq_ignore_ascii_case(NOTIFY) {
        return Status::MethodNotAllowed;
    }
    if !validate_upnp_headers(request.header(NT), request.header(NTS)) {
        return Status::BadRequest;
    }
    let Some(sid) = request.header(SID).map(str::trim).filter(|s| !s.is_empty()) else {
        return Status::PreconditionFailed;
    };

    let event_xml = request.body().map(|b| b.into_owned()).unwrap_or_default();
    let properties = parse_property_set(&event_xml);
    if properties.is_empty() {
        return Status::PreconditionFailed;
    }

    let payload = NotificationPayload {
        subscription_id: sid.to_string(),
        seq: parse_seq(request.header(SEQ)),
        properties,
        event_xml,
    };
    if router.route_event(payload) {
        Status::Ok
    } else {
        Status::PreconditionFailed
    }
}

fn parse_seq(value: Option<&str>) -> u64 {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(0)
}

/// Read `(variable, value)` pairs out of an `e:propertyset` body.
///
/// Children other than `property` are skipped. A different root element or
/// malformed XML yields no pairs.
pub fn parse_property_set(xml: &str) -> Vec<(String, String)> {
    if xml.trim().is_empty() {
        return Vec::new();
    }
    let Ok(root) = Element::parse(xml.as_bytes()) else {
        return Vec::new();
    };
    if root.name != "propertyset" {
        return Vec::new();
    }

    root.children
        .iter()
        .filter_map(|node| node.as_element())
        .filter(|e| e.name == "property")
        .flat_map(|property| property.children.iter().filter_map(|node| node.as_element()))
        .map(|variable| {
            let value = variable.get_text().map(|t| t.into_owned()).unwrap_or_default();
            (variable.name.clone(), value)
        })
        .collect()
}
