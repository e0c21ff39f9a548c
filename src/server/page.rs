//! The single HTML page of the web form.

pub const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Chatterbox TTS - Voice Synthesis &amp; Cloning</title>
<style>
  body { font-family: system-ui, sans-serif; max-width: 60rem; margin: 2rem auto; padding: 0 1rem; }
  form { display: grid; gap: 0.75rem; }
  label { display: grid; gap: 0.25rem; }
  .columns { display: grid; grid-template-columns: 1fr 1fr; gap: 2rem; }
  #status { white-space: pre-wrap; min-height: 4rem; }
  .error { color: #b00020; }
</style>
</head>
<body>
<h1>Chatterbox TTS - Voice Synthesis &amp; Cloning</h1>
<p>Generate natural speech with emotion control and optional voice cloning.</p>

<div class="columns">
<form id="tts-form">
  <label>Text to Synthesize
    <textarea name="text" rows="5" placeholder="Enter text here..."></textarea>
  </label>
  <label>Reference Voice (Optional)
    <input type="file" name="reference_audio" accept="audio/*">
  </label>
  <label>Emotion Intensity (0=flat, 2=expressive)
    <input type="range" name="exaggeration" min="0" max="2" step="0.1" value="0.5">
  </label>
  <label>Voice Variety (low=consistent, high=creative)
    <input type="range" name="temperature" min="0.1" max="2" step="0.1" value="1">
  </label>
  <label>Speech Pacing (high=monotone, low=dynamic)
    <input type="range" name="cfg_weight" min="0" max="1" step="0.1" value="0.5">
  </label>
  <label>Voice Fidelity
    <input type="range" name="flow_cfg_scale" min="1" max="5" step="0.1" value="2">
  </label>
  <label>Max Tokens (~25 per second)
    <input type="range" name="max_new_tokens" min="512" max="4096" step="256" value="2048">
  </label>
  <label>Seed (-1 for random)
    <input type="number" name="seed" step="1" value="-1">
  </label>
  <label>Device
    <select name="device">
      <option value="auto" selected>auto</option>
      <option value="cuda">cuda</option>
      <option value="mps">mps</option>
      <option value="cpu">cpu</option>
    </select>
  </label>
  <button type="submit">Generate Speech</button>
</form>

<section>
  <h2>Output</h2>
  <div id="status"></div>
  <audio id="player" controls hidden></audio>
</section>
</div>

<details>
<summary>Instructions</summary>
<ol>
  <li>Enter your text.</li>
  <li>(Optional) Upload 3-30 seconds of clean, single-speaker audio for voice cloning.</li>
  <li>Adjust the sliders.</li>
  <li>Click Generate Speech. Files are saved in the outputs folder.</li>
</ol>
<ul>
  <li><b>Emotion Intensity</b>: expressiveness (0 = flat, 2 = very expressive)</li>
  <li><b>Voice Variety</b>: randomness (low = consistent, high = creative)</li>
  <li><b>Speech Pacing</b>: rhythm (high = monotone, low = dynamic)</li>
  <li><b>Voice Fidelity</b>: adherence to the reference voice</li>
  <li><b>Max Tokens</b>: maximum length, about 25 tokens per second</li>
  <li><b>Seed</b>: reproducible results, -1 for random</li>
  <li><b>Device</b>: changing it after the first generation needs a model reload</li>
</ul>
</details>

<script>
const form = document.getElementById("tts-form");
const statusBox = document.getElementById("status");
const player = document.getElementById("player");

form.addEventListener("submit", async (event) => {
  event.preventDefault();
  const button = form.querySelector("button");
  button.disabled = true;
  statusBox.className = "";
  statusBox.textContent = "Generating speech...";
  player.hidden = true;

  try {
    const response = await fetch("/api/generate", { method: "POST", body: new FormData(form) });
    const result = await response.json();
    statusBox.textContent = result.status;
    if (result.ok) {
      player.src = result.audio_url;
      player.hidden = false;
    } else {
      statusBox.className = "error";
    }
  } catch (err) {
    statusBox.className = "error";
    statusBox.textContent = "Error: " + err;
  } finally {
    button.disabled = false;
  }
});
</script>
</body>
</html>
"#;
