//! JavaScript injected into controlled pages.
//!
//! Captured records are pushed to the host through a CDP binding the moment
//! they happen, so full page loads cannot wipe a page-local buffer.

/// Name of the CDP binding the recording script calls.
pub const CAPTURE_BINDING: &str = "__recorderCaptureEvent";

/// Attribute used to address elements returned by a lookup.
pub const HANDLE_ATTR: &str = "data-recorder-handle";

/// Shared helpers: positional path, visibility and target description.
const DOM_HELPERS: &str = r#"
    function structuralPath(el) {
        const parts = [];
        let node = el;
        while (node && node.nodeType === 1) {
            let index = 1;
            let sibling = node.previousElementSibling;
            while (sibling) {
                if (sibling.tagName === node.tagName) index++;
                sibling = sibling.previousElementSibling;
            }
            parts.unshift(node.tagName.toLowerCase() + '[' + index + ']');
            node = node.parentElement;
        }
        return '/' + parts.join('/');
    }

    function isVisible(el) {
        if (!el.isConnected) return false;
        const style = window.getComputedStyle(el);
        if (style.visibility === 'hidden' || style.display === 'none') return false;
        return el.getClientRects().length > 0;
    }

    function visibleText(el) {
        const tag = el.tagName;
        if (tag === 'INPUT') {
            const kind = (el.type || '').toLowerCase();
            if (kind === 'button' || kind === 'submit' || kind === 'reset') {
                return (el.value || '').trim().slice(0, 100) || null;
            }
            return null;
        }
        if (tag === 'TEXTAREA' || tag === 'SELECT') return null;
        return (el.innerText || el.textContent || el.alt || '').trim().slice(0, 100) || null;
    }

    function describe(el) {
        const className = typeof el.className === 'string' ? el.className : '';
        return {
            tagKind: el.tagName.toLowerCase(),
            elementId: el.id || null,
            cssClasses: className.split(/\s+/).filter(Boolean),
            visibleText: visibleText(el),
            placeholderHint: el.getAttribute('placeholder') || null,
            structuralPath: structuralPath(el),
            sourceUrl: window.location.href
        };
    }
"#;

const RECORDER_BODY: &str = r#"
    if (window.__recorderInstalled) return true;
    window.__recorderInstalled = true;
    window.__recorderActive = true;
    window.__recorderPaused = false;

    function send(record) {
        if (!window.__recorderActive || window.__recorderPaused) return;
        record.timestamp = Date.now();
        record.url = window.location.href;
        if (typeof __recorderCaptureEvent === 'function') {
            __recorderCaptureEvent(JSON.stringify(record));
        }
    }

    document.addEventListener('click', (e) => {
        const el = e.target;
        if (!el || el.nodeType !== 1) return;
        send(Object.assign({ type: 'click' }, describe(el)));
    }, true);

    // Sent on every keystroke; the host collapses runs on one field
    document.addEventListener('input', (e) => {
        const el = e.target;
        if (!el || (el.tagName !== 'INPUT' && el.tagName !== 'TEXTAREA')) return;
        send(Object.assign({ type: 'input', value: el.value || '' }, describe(el)));
    }, true);

    document.addEventListener('change', (e) => {
        const el = e.target;
        if (!el || el.tagName !== 'SELECT') return;
        const option = el.options[el.selectedIndex];
        send(Object.assign({
            type: 'select',
            value: el.value,
            selectedLabel: option ? option.text.trim() : null
        }, describe(el)));
    }, true);

    function navigated() {
        send({ type: 'navigation' });
    }
    const originalPush = history.pushState;
    history.pushState = function () {
        const result = originalPush.apply(this, arguments);
        navigated();
        return result;
    };
    const originalReplace = history.replaceState;
    history.replaceState = function () {
        const result = originalReplace.apply(this, arguments);
        navigated();
        return result;
    };
    window.addEventListener('popstate', navigated);
    window.addEventListener('hashchange', navigated);

    return true;
"#;

const FIND_BODY: &str = r#"
    let matches = [];
    if (strategy === 'structural_path') {
        const found = document.evaluate(value, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;
        if (found) matches = [found];
    } else if (strategy === 'element_id') {
        const found = document.getElementById(value);
        if (found) matches = [found];
    } else if (strategy === 'text') {
        matches = Array.from(document.querySelectorAll('body *')).filter((el) =>
            Array.from(el.childNodes).some((n) => n.nodeType === 3 && n.textContent.includes(value)));
    } else if (strategy === 'placeholder') {
        matches = Array.from(document.querySelectorAll('[placeholder]'))
            .filter((el) => el.getAttribute('placeholder') === value);
    } else if (strategy === 'class') {
        matches = Array.from(document.getElementsByClassName(value));
    }

    window.__recorderHandleSeq = window.__recorderHandleSeq || 0;
    return matches.map((el) => {
        let handle = el.getAttribute(handleAttr);
        if (!handle) {
            window.__recorderHandleSeq += 1;
            handle = String(window.__recorderHandleSeq);
            el.setAttribute(handleAttr, handle);
        }
        return {
            handle: handle,
            tag: el.tagName.toLowerCase(),
            visible: isVisible(el),
            enabled: !el.disabled
        };
    });
"#;

const PAGE_STATE_BODY: &str = r#"
    const elements = [];
    function push(role, el, extra) {
        if (!isVisible(el)) return;
        elements.push(Object.assign({ role: role }, describe(el), extra || {}));
    }
    document.querySelectorAll('input').forEach((el) => push('input', el, { value: el.value || null }));
    document.querySelectorAll('button').forEach((el) => push('button', el));
    document.querySelectorAll('a').forEach((el) => push('link', el, { href: el.href || null }));
    document.querySelectorAll('select').forEach((el) => push('select', el, {
        options: Array.from(el.options).map((o) => ({ value: o.value, text: o.text.trim() }))
    }));
    return { title: document.title || '', elements: elements };
"#;

/// Installs the listeners. Idempotent per document.
pub fn recording_script() -> String {
    ["(() => {", DOM_HELPERS, RECORDER_BODY, "})()"].concat()
}

pub const STOP_RECORDING_SCRIPT: &str = r#"
(() => {
    window.__recorderActive = false;
    return true;
})()
"#;

pub fn pause_script(paused: bool) -> String {
    format!("window.__recorderPaused = {}; true", paused)
}

/// Runs one lookup and tags every match with a handle attribute.
pub fn find_script(strategy: &str, value: &str) -> String {
    let args = format!(
        "const strategy = {}; const value = {}; const handleAttr = {};",
        js_string(strategy),
        js_string(value),
        js_string(HANDLE_ATTR)
    );
    ["(() => {", DOM_HELPERS, &args, FIND_BODY, "})()"].concat()
}

pub fn page_state_script() -> String {
    ["(() => {", DOM_HELPERS, PAGE_STATE_BODY, "})()"].concat()
}

/// Selector for an element previously returned by [`find_script`].
pub fn handle_selector(handle: &str) -> String {
    format!("[{}={}]", HANDLE_ATTR, js_string(handle))
}

pub fn clear_script(handle: &str) -> String {
    format!(
        r#"(() => {{
    const el = document.querySelector({selector});
    if (!el) return false;
    el.focus();
    el.value = '';
    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
    el.dispatchEvent(new Event('change', {{ bubbles: true }}));
    return true;
}})()"#,
        selector = js_string(&handle_selector(handle))
    )
}

/// Selects by option value or by trimmed option text; evaluates to whether an
/// option matched.
pub fn select_script(handle: &str, needle: &str, by_label: bool) -> String {
    format!(
        r#"(() => {{
    const el = document.querySelector({selector});
    if (!el || el.tagName !== 'SELECT') return false;
    const needle = {needle};
    const option = Array.from(el.options).find((o) => {by_label} ? o.text.trim() === needle : o.value === needle);
    if (!option) return false;
    el.value = option.value;
    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
    el.dispatchEvent(new Event('change', {{ bubbles: true }}));
    return true;
}})()"#,
        selector = js_string(&handle_selector(handle)),
        needle = js_string(needle),
        by_label = by_label
    )
}

/// JSON string literals are valid JavaScript string literals.
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}
