//! Console page
//!
//! A single HTML document: output area, prompt form and a small script that
//! posts each command line and appends the returned fragments.

use crate::console::prompt::fill_slots;

/// Render the console page for a session
///
/// Both `title` and `prompt` are already escaped HTML.
pub fn render_page(title: &str, prompt: &str) -> String {
    fill_slots(PAGE_TEMPLATE, &[("{{TITLE}}", title), ("{{PROMPT}}", prompt)])
}

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{{TITLE}}</title>
    <style>
        body {
            background: #333;
            color: #fff;
            padding: 10px;
            margin: 0;
            font-size: 12px;
            font-family: monospace;
            line-height: 14px;
        }
        #console { margin: 0; }
        form { width: 100%; }
        input {
            width: 60%;
            background: #333;
            color: #fff;
            border: none;
            outline: none;
            font-family: monospace;
        }
        .clear { clear: both; }
        .pwd { color: #5b8cf2; }
        .error { color: #f22; }

        .color-30 { color: #555; }
        .color-31 { color: #f22; }
        .color-32 { color: #2da814; }
        .color-33 { color: orange; }
        .color-34 { color: #5542f2; }
        .color-35 { color: #ff3; }
        .color-36 { color: violet; }
        .color-37 { color: #cecece; }
        .color-40 { background-color: #000; }
        .color-41 { background-color: #f22; }
        .color-42 { background-color: #2da814; }
        .color-43 { color: #000; background-color: #ff3; }
    </style>
</head>
<body>
<div id="console"></div>
<form id="prompt" action="./" method="post" autocomplete="off">
    {{PROMPT}}<input type="text" name="command" id="command" autofocus />
</form>
<script>
(function () {
    var output = document.getElementById('console');
    var form = document.getElementById('prompt');
    var input = document.getElementById('command');
    var history = [];
    var cursor = 0;

    form.addEventListener('submit', function (event) {
        event.preventDefault();
        var line = input.value;
        if (line.length > 0) {
            history.push(line);
        }
        cursor = history.length;
        input.value = '';
        input.disabled = true;

        fetch(form.action, {
            method: 'POST',
            credentials: 'same-origin',
            headers: { 'Content-Type': 'application/x-www-form-urlencoded' },
            body: new URLSearchParams({ command: line })
        })
            .then(function (response) {
                if (!response.ok) {
                    throw new Error(response.status + ' ' + response.statusText);
                }
                return response.json();
            })
            .then(function (data) {
                output.insertAdjacentHTML('beforeend', data.command);
                output.insertAdjacentHTML('beforeend', data.result);
                var pwd = form.querySelector('.pwd');
                if (pwd) {
                    pwd.innerHTML = data.pwd;
                }
                document.title = data.pwd;
            })
            .catch(function (err) {
                var span = document.createElement('span');
                span.className = 'error';
                span.textContent = err.message;
                output.appendChild(span);
                output.appendChild(document.createElement('br'));
            })
            .finally(function () {
                input.disabled = false;
                input.focus();
                window.scrollTo(0, document.body.scrollHeight);
            });
    });

    input.addEventListener('keydown', function (event) {
        if (event.key === 'ArrowUp') {
            event.preventDefault();
            if (cursor > 0) {
                cursor -= 1;
                input.value = history[cursor];
            }
        } else if (event.key === 'ArrowDown') {
            event.preventDefault();
            if (cursor < history.length) {
                cursor += 1;
            }
            input.value = cursor < history.length ? history[cursor] : '';
        } else if (event.key === 'l' && event.ctrlKey) {
            event.preventDefault();
            output.innerHTML = '';
        }
    });

    document.documentElement.addEventListener('click', function () {
        if (!window.getSelection().toString()) {
            input.focus();
        }
    });
})();
</script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_filled() {
        let page = render_page("~/", r#"console@localhost <span class="pwd">~/</span> $ "#);
        assert!(page.contains("<title>~/</title>"));
        assert!(page.contains(r#"console@localhost <span class="pwd">~/</span> $ <input"#));
        assert!(!page.contains("{{"));
    }

    #[test]
    fn test_slot_markers_in_values_stay_literal() {
        let page = render_page("{{PROMPT}}", "$ ");
        assert!(page.contains("<title>{{PROMPT}}</title>"));
        assert_eq!(page.matches("$ <input").count(), 1);
    }
}
