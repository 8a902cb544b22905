use crate::favorites::Theme;

pub fn render_index(theme: Theme, site_url: &str) -> String {
    INDEX_HTML
        .replace("{{THEME}}", theme.as_str())
        .replace("{{SITE_URL}}", site_url)
}

pub fn robots_txt(site_url: &str) -> String {
    format!("User-agent: *\nAllow: /\nDisallow: /api/\n\nSitemap: {site_url}/sitemap.xml\n")
}

pub fn sitemap_xml(site_url: &str) -> String {
    const PAGES: [(&str, &str); 4] = [
        ("/", "1.0"),
        ("/?view=channels", "0.8"),
        ("/?view=videos", "0.8"),
        ("/?view=favorites", "0.5"),
    ];
    let urls: String = PAGES
        .iter()
        .map(|(path, priority)| {
            format!(
                "  <url>\n    <loc>{site_url}{}</loc>\n    <changefreq>daily</changefreq>\n    <priority>{priority}</priority>\n  </url>\n",
                path.replace('&', "&amp;")
            )
        })
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n{urls}</urlset>\n"
    )
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en" data-theme="{{THEME}}">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>Tube Insight</title>
  <link rel="canonical" href="{{SITE_URL}}/" />
  <style>
    :root {
      --bg: #f6f4ef;
      --ink: #1f2328;
      --muted: #6b6f76;
      --card: #ffffff;
      --accent: #e5322d;
      --line: rgba(31, 35, 40, 0.1);
    }

    [data-theme="dark"] {
      --bg: #121417;
      --ink: #e8e6e3;
      --muted: #9aa0a6;
      --card: #1c1f24;
      --line: rgba(232, 230, 227, 0.12);
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      min-height: 100vh;
      background: var(--bg);
      color: var(--ink);
      font-family: "Inter", "Segoe UI", sans-serif;
      padding: 32px 18px 48px;
    }

    .app {
      width: min(960px, 100%);
      margin: 0 auto;
      display: grid;
      gap: 24px;
    }

    header {
      display: flex;
      justify-content: space-between;
      align-items: center;
      gap: 16px;
    }

    h1 {
      margin: 0;
      font-size: clamp(1.8rem, 4vw, 2.4rem);
    }

    .controls {
      display: flex;
      flex-wrap: wrap;
      gap: 10px;
    }

    input,
    select,
    button {
      font: inherit;
      padding: 10px 14px;
      border-radius: 10px;
      border: 1px solid var(--line);
      background: var(--card);
      color: var(--ink);
    }

    button.primary {
      background: var(--accent);
      color: white;
      border: none;
      cursor: pointer;
    }

    table {
      width: 100%;
      border-collapse: collapse;
      background: var(--card);
      border-radius: 14px;
      overflow: hidden;
    }

    th,
    td {
      padding: 10px 12px;
      border-bottom: 1px solid var(--line);
      text-align: left;
    }

    .star {
      cursor: pointer;
      color: var(--muted);
    }

    .star.on {
      color: #f5b301;
    }

    .status {
      min-height: 1.2em;
      color: var(--muted);
    }

    .status[data-type="error"] {
      color: #c63b2b;
    }

    .status[data-type="quota"] {
      color: #b7791f;
    }
  </style>
</head>
<body>
  <main class="app">
    <header>
      <h1>Tube Insight</h1>
      <button id="theme-btn" type="button">Toggle theme</button>
    </header>

    <form class="controls" id="search-form">
      <select id="kind">
        <option value="channel">Channels</option>
        <option value="video">Videos</option>
      </select>
      <input id="query" placeholder="Search keyword" />
      <select id="sort"></select>
      <select id="size">
        <option>10</option>
        <option selected>20</option>
        <option>50</option>
      </select>
      <button class="primary" type="submit">Rank</button>
      <button id="favorites-btn" type="button">Favorites</button>
    </form>

    <div class="status" id="status"></div>

    <table>
      <thead>
        <tr><th>#</th><th></th><th>Title</th><th>Value</th><th>Grade</th></tr>
      </thead>
      <tbody id="rows"></tbody>
    </table>
  </main>

  <script>
    const SORTS = {
      channel: ['subscriberCount', 'viewCount', 'efficiencyRatio'],
      video: ['viewCount', 'likeCount', 'commentCount', 'velocity', 'engagementRate']
    };
    const kindEl = document.getElementById('kind');
    const sortEl = document.getElementById('sort');
    const rowsEl = document.getElementById('rows');
    const statusEl = document.getElementById('status');

    const setStatus = (message, type) => {
      statusEl.textContent = message;
      statusEl.dataset.type = type || '';
    };

    const favorites = () => {
      try {
        return JSON.parse(localStorage.getItem('favorites') || '[]');
      } catch (err) {
        return [];
      }
    };

    const toggleFavorite = (id) => {
      const ids = favorites();
      const index = ids.indexOf(id);
      if (index >= 0) {
        ids.splice(index, 1);
      } else {
        ids.push(id);
      }
      localStorage.setItem('favorites', JSON.stringify(ids));
      return index < 0;
    };

    const applyTheme = (theme) => {
      document.documentElement.dataset.theme = theme;
      localStorage.setItem('theme', theme);
    };

    const fillSorts = () => {
      sortEl.innerHTML = SORTS[kindEl.value]
        .map((key) => `<option value="${key}">${key}</option>`)
        .join('');
    };

    const renderRows = (rows, starrable) => {
      const ids = favorites();
      rowsEl.innerHTML = '';
      rows.forEach((row) => {
        const tr = document.createElement('tr');
        const star = starrable
          ? `<span class="star ${ids.includes(row.id) ? 'on' : ''}" data-id="${row.id}">&#9733;</span>`
          : '';
        tr.innerHTML = `<td>${row.rank}</td><td>${star}</td><td></td><td>${row.display}</td><td>${row.grade || ''}</td>`;
        tr.children[2].textContent = row.title;
        rowsEl.appendChild(tr);
      });
    };

    const load = async (url, starrable) => {
      setStatus('Loading...', 'info');
      const res = await fetch(url);
      const body = await res.json();
      if (!res.ok) {
        if (body.quotaExceeded) {
          setStatus('Daily API quota reached. Rankings will be available again after the quota resets.', 'quota');
        } else {
          setStatus(body.error || 'Retrieval failed', 'error');
        }
        return;
      }
      renderRows(Array.isArray(body) ? body : body.rows, starrable);
      setStatus('', '');
    };

    document.getElementById('search-form').addEventListener('submit', (event) => {
      event.preventDefault();
      const params = new URLSearchParams({
        type: kindEl.value,
        q: document.getElementById('query').value,
        sort: sortEl.value,
        size: document.getElementById('size').value
      });
      load(`/api/ranking?${params}`, kindEl.value === 'channel').catch((err) => setStatus(err.message, 'error'));
    });

    document.getElementById('favorites-btn').addEventListener('click', () => {
      const ids = favorites().join(',');
      load(`/api/favorites?ids=${encodeURIComponent(ids)}`, true).catch((err) => setStatus(err.message, 'error'));
    });

    rowsEl.addEventListener('click', (event) => {
      const id = event.target.dataset && event.target.dataset.id;
      if (id) {
        event.target.classList.toggle('on', toggleFavorite(id));
      }
    });

    document.getElementById('theme-btn').addEventListener('click', () => {
      applyTheme(document.documentElement.dataset.theme === 'dark' ? 'light' : 'dark');
    });

    kindEl.addEventListener('change', fillSorts);
    fillSorts();
    applyTheme(localStorage.getItem('theme') || document.documentElement.dataset.theme);
  </script>
</body>
</html>
"#;
